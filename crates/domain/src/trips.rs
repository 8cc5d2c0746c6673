use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::DomainResult;
use crate::error::DomainError;
use crate::ports::trips::TripRepository;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Trip {
    pub trip_id: String,
    pub name: String,
    pub destination: String,
    pub created_by: String,
    pub member_ids: Vec<String>,
}

impl Trip {
    pub fn has_member(&self, user_id: &str) -> bool {
        self.member_ids.iter().any(|id| id == user_id)
    }
}

#[derive(Clone)]
pub struct TripService {
    trips: Arc<dyn TripRepository>,
}

impl TripService {
    pub fn new(trips: Arc<dyn TripRepository>) -> Self {
        Self { trips }
    }

    pub async fn get_trip(&self, trip_id: &str) -> DomainResult<Trip> {
        self.trips
            .get_trip(trip_id)
            .await?
            .ok_or(DomainError::TripNotFound)
    }

    /// Adds the user to the trip's members. An existing group chat for the trip is
    /// left untouched.
    pub async fn join_trip(&self, trip_id: &str, user_id: &str) -> DomainResult<Trip> {
        let trip = self.get_trip(trip_id).await?;
        if trip.has_member(user_id) {
            return Err(DomainError::AlreadyMember);
        }
        let trip = self.trips.add_member(&trip.trip_id, user_id).await?;
        tracing::info!(trip_id = %trip.trip_id, user_id, "user joined trip");
        Ok(trip)
    }
}
