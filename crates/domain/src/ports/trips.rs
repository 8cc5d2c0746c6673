use crate::DomainResult;
use crate::trips::Trip;

pub trait TripRepository: Send + Sync {
    fn get_trip(&self, trip_id: &str) -> crate::ports::BoxFuture<'_, DomainResult<Option<Trip>>>;

    fn create_trip(&self, trip: &Trip) -> crate::ports::BoxFuture<'_, DomainResult<Trip>>;

    /// Appends `user_id` to the member list unless already present.
    ///
    /// Fails with `DomainError::TripNotFound` or `DomainError::AlreadyMember`.
    fn add_member(
        &self,
        trip_id: &str,
        user_id: &str,
    ) -> crate::ports::BoxFuture<'_, DomainResult<Trip>>;
}
