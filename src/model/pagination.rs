use rocket::request::{self, FromRequest, Request};
use serde::Serialize;

use crate::error::{reject, Error, Result};

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 100;

/// A 1-indexed page request.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Pagination {
    page: u64,
    page_size: u64,
}

impl Pagination {
    pub fn new(page: u64, page_size: u64) -> Result<Self> {
        if page == 0 {
            return Err(Error::BadRequest("pages are numbered from 1".to_string()));
        }
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(Error::BadRequest(format!(
                "page size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(Self { page, page_size })
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Number of records before this page.
    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    /// Wrap one page of `records` drawn from `count` matching records in total.
    pub fn result<T>(self, records: Vec<T>, count: u64) -> Paginated<T> {
        Paginated {
            records,
            total_pages: (count + self.page_size - 1) / self.page_size,
            count,
            page: self.page,
            page_size: self.page_size,
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Pagination {
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let page = match req.query_value::<u64>("page").unwrap_or(Ok(1)) {
            Ok(page) => page,
            Err(_) => return reject(req, Error::BadRequest("`page` must be a number".to_string())),
        };
        let page_size = match req
            .query_value::<u64>("page_size")
            .unwrap_or(Ok(DEFAULT_PAGE_SIZE))
        {
            Ok(page_size) => page_size,
            Err(_) => {
                return reject(
                    req,
                    Error::BadRequest("`page_size` must be a number".to_string()),
                )
            }
        };
        match Self::new(page, page_size) {
            Ok(pagination) => request::Outcome::Success(pagination),
            Err(e) => reject(req, e),
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Paginated<T> {
    pub records: Vec<T>,
    pub total_pages: u64,
    /// Matching records across all pages.
    pub count: u64,
    pub page: u64,
    pub page_size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn rejects_out_of_range() {
        assert_eq!(Pagination::new(0, 10).unwrap_err().kind(), ErrorKind::BadRequest);
        assert_eq!(Pagination::new(1, 0).unwrap_err().kind(), ErrorKind::BadRequest);
        assert_eq!(
            Pagination::new(1, MAX_PAGE_SIZE + 1).unwrap_err().kind(),
            ErrorKind::BadRequest
        );
        assert!(Pagination::new(1, MAX_PAGE_SIZE).is_ok());
    }

    #[test]
    fn total_pages_rounds_up() {
        let pagination = Pagination::new(2, 10).unwrap();
        assert_eq!(pagination.skip(), 10);
        assert_eq!(pagination.result(Vec::<u8>::new(), 0).total_pages, 0);
        assert_eq!(pagination.result(Vec::<u8>::new(), 10).total_pages, 1);
        assert_eq!(pagination.result(Vec::<u8>::new(), 11).total_pages, 2);
    }
}
