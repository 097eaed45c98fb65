//! Gateway substitutes for service tests

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::db::{GatewayError, GraphGateway};
use crate::models::{Listing, Transaction, User};

/// Gateway whose every call times out, as if the store were unreachable
pub struct UnreachableGateway;

fn down<T>() -> Result<T, GatewayError> {
    Err(GatewayError::Timeout(Duration::from_secs(5)))
}

#[async_trait]
impl GraphGateway for UnreachableGateway {
    async fn get_user(&self, _identifier: &str) -> Result<Option<User>, GatewayError> {
        down()
    }

    async fn insert_user(&self, _user: &User) -> Result<(), GatewayError> {
        down()
    }

    async fn create_following(&self, _user: &User, _follower: &User) -> Result<(), GatewayError> {
        down()
    }

    async fn unfollow(&self, _user: &User, _follower: &User) -> Result<(), GatewayError> {
        down()
    }

    async fn get_followers(&self, _user: &User) -> Result<Vec<User>, GatewayError> {
        down()
    }

    async fn get_following(&self, _user: &User) -> Result<Vec<User>, GatewayError> {
        down()
    }

    async fn delete_user(&self, _username: &str, _email: &str) -> Result<(), GatewayError> {
        down()
    }

    async fn create_listing(&self, _listing: &Listing) -> Result<(), GatewayError> {
        down()
    }

    async fn create_user_listing(&self, _seller: &User, _listing: &Listing) -> Result<(), GatewayError> {
        down()
    }

    async fn mark_sold(
        &self,
        _buyer: &User,
        _listing_id: &str,
        _date: DateTime<Utc>,
    ) -> Result<Transaction, GatewayError> {
        down()
    }

    async fn is_sold(&self, _listing_id: &str) -> Result<Option<Transaction>, GatewayError> {
        down()
    }

    async fn get_listing(&self, _listing_id: &str) -> Result<Option<Listing>, GatewayError> {
        down()
    }

    async fn seller_of(&self, _listing_id: &str) -> Result<Option<User>, GatewayError> {
        down()
    }

    async fn listings_for(&self, _seller: &User) -> Result<Vec<Listing>, GatewayError> {
        down()
    }
}
