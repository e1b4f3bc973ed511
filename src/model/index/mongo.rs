use mongodb::{
    bson::{doc, Document},
    options::{FindOptions, ReplaceOptions},
    Database,
};
use rocket::futures::TryStreamExt;

use crate::error::Result;
use crate::model::{
    address::Address,
    mongodb::{ensure_indexes_exist, is_duplicate_key_error, Coll},
    pagination::Pagination,
};

use super::{Admin, IndexStore, VoteFilter, VoteRecord};

/// An index persisted in MongoDB.
pub struct MongoIndex {
    admins: Coll<Admin>,
    votes: Coll<VoteRecord>,
}

impl MongoIndex {
    /// Open the index in `db`, creating its indexes if needed.
    pub async fn connect(db: Database) -> Result<Self> {
        ensure_indexes_exist(&db).await?;
        Ok(Self {
            admins: Coll::from_db(&db),
            votes: Coll::from_db(&db),
        })
    }
}

fn filter_doc(filter: &VoteFilter) -> Document {
    match filter {
        VoteFilter::All => doc! {},
        VoteFilter::ByCreator(creator) => doc! {"admin_address": *creator},
        VoteFilter::Among(votes) => doc! {
            "contract_address": {"$in": votes.iter().copied().collect::<Vec<_>>()}
        },
    }
}

#[rocket::async_trait]
impl IndexStore for MongoIndex {
    async fn admins(&self) -> Result<Vec<Admin>> {
        let options = FindOptions::builder()
            .sort(doc! {"wallet_address": 1})
            .build();
        let admins = self.admins.find(None, options).await?.try_collect().await?;
        Ok(admins)
    }

    async fn upsert_admin(&self, admin: &Admin) -> Result<()> {
        let options = ReplaceOptions::builder().upsert(true).build();
        self.admins
            .replace_one(doc! {"wallet_address": admin.wallet_address}, admin, options)
            .await?;
        Ok(())
    }

    async fn remove_admin(&self, address: &Address) -> Result<bool> {
        let result = self
            .admins
            .delete_one(doc! {"wallet_address": *address}, None)
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn insert_vote(&self, record: &VoteRecord) -> Result<bool> {
        match self.votes.insert_one(record, None).await {
            Ok(_) => Ok(true),
            Err(e) if is_duplicate_key_error(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn contains_vote(&self, vote: &Address) -> Result<bool> {
        let found = self
            .votes
            .find_one(doc! {"contract_address": *vote}, None)
            .await?;
        Ok(found.is_some())
    }

    async fn page_votes(
        &self,
        filter: &VoteFilter,
        pagination: &Pagination,
    ) -> Result<(Vec<VoteRecord>, u64)> {
        let filter = filter_doc(filter);
        let count = self.votes.count_documents(filter.clone(), None).await?;
        let options = FindOptions::builder()
            .sort(doc! {"seq": 1})
            .skip(pagination.skip())
            .limit(pagination.page_size() as i64)
            .build();
        let records = self
            .votes
            .find(filter, options)
            .await?
            .try_collect()
            .await?;
        Ok((records, count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_select_by_address_string() {
        assert_eq!(filter_doc(&VoteFilter::All), doc! {});
        let creator = Address::example(1);
        assert_eq!(
            filter_doc(&VoteFilter::ByCreator(creator)),
            doc! {"admin_address": creator.to_string()}
        );
        let votes = vec![Address::example(2), Address::example(3)];
        assert_eq!(
            filter_doc(&VoteFilter::Among(votes.clone())),
            doc! {"contract_address": {"$in": [votes[0].to_string(), votes[1].to_string()]}}
        );
    }
}
