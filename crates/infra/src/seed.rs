use anyhow::Context;
use serde::Deserialize;
use tripmate_domain::error::DomainError;
use tripmate_domain::identity::UserProfile;
use tripmate_domain::ports::trips::TripRepository;
use tripmate_domain::ports::users::UserRepository;
use tripmate_domain::trips::Trip;

/// Users and trips owned by external services, loaded into a local backend.
#[derive(Debug, Default, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub users: Vec<UserProfile>,
    #[serde(default)]
    pub trips: Vec<Trip>,
}

impl SeedData {
    pub async fn from_file(path: &str) -> anyhow::Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("read seed file {path}"))?;
        serde_json::from_str(&raw).with_context(|| format!("parse seed file {path}"))
    }

    /// Existing trips are left as they are.
    pub async fn apply(
        &self,
        users: &dyn UserRepository,
        trips: &dyn TripRepository,
    ) -> anyhow::Result<()> {
        for user in &self.users {
            users
                .upsert_user(user)
                .await
                .with_context(|| format!("seed user {}", user.user_id))?;
        }
        for trip in &self.trips {
            match trips.create_trip(trip).await {
                Ok(_) | Err(DomainError::Conflict) => {}
                Err(err) => {
                    return Err(err).with_context(|| format!("seed trip {}", trip.trip_id));
                }
            }
        }
        tracing::info!(
            users = self.users.len(),
            trips = self.trips.len(),
            "seed data applied"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::{InMemoryTripRepository, InMemoryUserRepository};

    #[tokio::test]
    async fn apply_is_repeatable() {
        let seed: SeedData = serde_json::from_value(serde_json::json!({
            "users": [
                { "user_id": "u-1", "name": "Ayu", "email": "ayu@example.com" }
            ],
            "trips": [
                {
                    "trip_id": "t-1",
                    "name": "Bali",
                    "destination": "Denpasar",
                    "created_by": "u-1",
                    "member_ids": ["u-1"]
                }
            ]
        }))
        .expect("seed");

        let users = InMemoryUserRepository::new();
        let trips = InMemoryTripRepository::new();
        seed.apply(&users, &trips).await.expect("first apply");
        seed.apply(&users, &trips).await.expect("second apply");

        assert!(users.get_user("u-1").await.expect("user").is_some());
        assert_eq!(
            trips
                .get_trip("t-1")
                .await
                .expect("trip")
                .map(|trip| trip.member_ids),
            Some(vec!["u-1".to_string()])
        );
    }
}
