use std::sync::Arc;

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;
use tripmate_domain::DomainResult;
use tripmate_domain::error::DomainError;
use tripmate_domain::identity::ActorIdentity;
use tripmate_domain::ports::BoxFuture;
use tripmate_domain::ports::auth::TokenValidator;
use tripmate_domain::ports::users::UserRepository;

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(alias = "userId")]
    sub: String,
    #[allow(dead_code)]
    exp: usize,
}

/// HS256 bearer tokens whose subject must name an existing user.
#[derive(Clone)]
pub struct JwtTokenValidator {
    key: DecodingKey,
    users: Arc<dyn UserRepository>,
}

impl JwtTokenValidator {
    pub fn new(secret: &str, users: Arc<dyn UserRepository>) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            users,
        }
    }

    fn subject(&self, token: &str) -> DomainResult<String> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        let data = decode::<Claims>(token, &self.key, &validation).map_err(|err| {
            tracing::warn!(error = %err, "invalid auth token");
            DomainError::Unauthenticated
        })?;
        let subject = data.claims.sub.trim().to_string();
        if subject.is_empty() {
            return Err(DomainError::Unauthenticated);
        }
        Ok(subject)
    }
}

impl TokenValidator for JwtTokenValidator {
    fn validate(&self, token: &str) -> BoxFuture<'_, DomainResult<ActorIdentity>> {
        let subject = self.subject(token);
        let users = self.users.clone();
        Box::pin(async move {
            let subject = subject?;
            let Some(user) = users.get_user(&subject).await? else {
                tracing::warn!(user_id = %subject, "token subject is not a known user");
                return Err(DomainError::Unauthenticated);
            };
            Ok(ActorIdentity::from(&user))
        })
    }
}
