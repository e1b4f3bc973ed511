use rocket::{serde::json::Json, Route, State};
use serde::Deserialize;

use crate::{
    api::JsonBody,
    error::Result,
    ledger::{LedgerClient, Receipt, Transaction},
    model::{
        address::Address,
        auth::{rights::Root, AuthToken},
        index::{Admin, Index, IndexStore},
        role::SystemRole,
    },
    sync::{AdminRosterSynchronizer, SyncReport},
};

pub fn routes() -> Vec<Route> {
    routes![get_admins, sync_admins, grant_admin, revoke_admin]
}

#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    pub wallet_address: Address,
}

/// The cached roster. May lag the ledger until the next sync.
#[get("/admins")]
async fn get_admins(_token: AuthToken<Root>, index: &State<Index>) -> Result<Json<Vec<Admin>>> {
    Ok(Json(index.admins().await?))
}

#[post("/admins/sync")]
async fn sync_admins(
    _token: AuthToken<Root>,
    synchronizer: &State<AdminRosterSynchronizer>,
) -> Result<Json<SyncReport>> {
    Ok(Json(synchronizer.sync().await?))
}

#[post("/admins", data = "<request>", format = "json")]
async fn grant_admin(
    token: AuthToken<Root>,
    request: JsonBody<GrantRequest>,
    ledger: &State<LedgerClient>,
    synchronizer: &State<AdminRosterSynchronizer>,
) -> Result<Json<Receipt>> {
    set_role(
        token.address,
        request.wallet_address,
        SystemRole::Admin,
        ledger,
        synchronizer,
    )
    .await
}

#[delete("/admins/<address>")]
async fn revoke_admin(
    token: AuthToken<Root>,
    address: Address,
    ledger: &State<LedgerClient>,
    synchronizer: &State<AdminRosterSynchronizer>,
) -> Result<Json<Receipt>> {
    set_role(token.address, address, SystemRole::User, ledger, synchronizer).await
}

/// Change `target`'s role on the ledger, then bring the cached roster up to date.
/// The confirmed change is reported even if the roster has to wait for a later pass.
async fn set_role(
    sender: Address,
    target: Address,
    role: SystemRole,
    ledger: &LedgerClient,
    synchronizer: &AdminRosterSynchronizer,
) -> Result<Json<Receipt>> {
    let receipt = ledger
        .send(sender, Transaction::SetRole { target, role })
        .await?;
    synchronizer.sync_after_write().await;
    Ok(Json(receipt))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::{serde_json::json, Value},
    };

    use crate::model::auth::examples::TestWallet;

    use super::*;

    async fn roster(client: &Client) -> Vec<Address> {
        let response = client.get(uri!(get_admins)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let admins: Vec<Admin> = response.into_json().await.unwrap();
        admins.into_iter().map(|admin| admin.wallet_address).collect()
    }

    #[backend_test(root)]
    async fn grant_then_revoke(client: Client, ledger: LedgerClient) {
        let target = TestWallet::new(7).address();
        assert!(!roster(&client).await.contains(&target));

        let response = client
            .post(uri!(grant_admin))
            .header(ContentType::JSON)
            .body(json!({ "wallet_address": target }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let receipt: Value = response.into_json().await.unwrap();
        assert_eq!(receipt["event"], "role_changed");
        assert_eq!(ledger.role_of(&target).await.unwrap(), SystemRole::Admin);
        assert!(roster(&client).await.contains(&target));

        let response = client.delete(uri!(revoke_admin(target))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        assert_eq!(ledger.role_of(&target).await.unwrap(), SystemRole::User);
        assert!(!roster(&client).await.contains(&target));
    }

    #[backend_test(root)]
    async fn manual_sync_picks_up_ledger_changes(client: Client, ledger: LedgerClient) {
        let target = TestWallet::new(8).address();
        ledger
            .send(
                TestWallet::root().address(),
                Transaction::SetRole {
                    target,
                    role: SystemRole::Admin,
                },
            )
            .await
            .unwrap();
        assert!(!roster(&client).await.contains(&target));

        let report: SyncReport = client
            .post(uri!(sync_admins))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert!(report.added >= 1);
        assert!(roster(&client).await.contains(&target));

        let report: SyncReport = client
            .post(uri!(sync_admins))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert!(report.is_noop());
    }

    #[backend_test(root)]
    async fn root_cannot_be_demoted(client: Client, ledger: LedgerClient) {
        let root = TestWallet::root().address();
        let response = client.delete(uri!(revoke_admin(root))).dispatch().await;
        assert_eq!(Status::Forbidden, response.status());
        assert_eq!(ledger.role_of(&root).await.unwrap(), SystemRole::Root);
    }

    #[backend_test(admin)]
    async fn admin_cannot_manage_admins(client: Client) {
        let response = client.get(uri!(get_admins)).dispatch().await;
        assert_eq!(Status::Forbidden, response.status());

        let response = client
            .post(uri!(grant_admin))
            .header(ContentType::JSON)
            .body(json!({ "wallet_address": TestWallet::new(9).address() }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Forbidden, response.status());
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["kind"], "NotAuthorized");
    }

    #[backend_test(user)]
    async fn user_cannot_sync(client: Client) {
        let response = client.post(uri!(sync_admins)).dispatch().await;
        assert_eq!(Status::Forbidden, response.status());
    }

    #[rocket::async_test]
    async fn grant_confirmed_while_index_is_down() {
        let (ledger, _) = crate::testing::ledger_and_index();
        let rocket = crate::rocket_with(
            rocket::custom(crate::config::test_figment()),
            ledger.clone(),
            Index::new(crate::testing::UnavailableIndex),
        );
        let client = Client::tracked(rocket).await.unwrap();
        crate::testing::login(&client, &TestWallet::root()).await;

        let target = TestWallet::new(7).address();
        let response = client
            .post(uri!(grant_admin))
            .header(ContentType::JSON)
            .body(json!({ "wallet_address": target }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        assert_eq!(ledger.role_of(&target).await.unwrap(), SystemRole::Admin);

        // Only an explicit sync reports the index failure.
        let response = client.post(uri!(sync_admins)).dispatch().await;
        assert_eq!(Status::InternalServerError, response.status());
    }
}
