use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::core::ports::tokener::{Payload, Tokener};
use crate::error::Error;

pub struct JWT {
    secret: Vec<u8>,
}

impl JWT {
    pub fn new(secret: Vec<u8>) -> Self {
        Self { secret }
    }
}

impl<P> Tokener<P> for JWT
where
    P: Payload,
{
    fn gen_token(&self, payload: &P) -> Result<String, Error> {
        let header = Header::new(Algorithm::HS256);
        let key = EncodingKey::from_secret(&self.secret);
        let token = encode(&header, payload, &key)?;
        Ok(token)
    }

    fn verify_token(&self, token: &str) -> Result<P, Error> {
        let key = DecodingKey::from_secret(&self.secret);
        let validation = Validation::new(Algorithm::HS256);
        let payload = decode(token, &key, &validation)?;
        Ok(payload.claims)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Deserialize, Serialize)]
    struct Claim {
        user: String,
        role: String,
        exp: i64,
    }

    impl Payload for Claim {
        fn user(&self) -> &str {
            &self.user
        }
    }

    fn claim(user: &str) -> Claim {
        Claim {
            user: user.into(),
            role: "user".into(),
            exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp(),
        }
    }

    #[test]
    fn test_gen_and_verify_token() {
        let jwt = JWT::new(vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 0]);
        let c = claim("42");
        let token = jwt.gen_token(&c).unwrap();
        let verified: Claim = jwt.verify_token(&token).unwrap();
        assert_eq!(verified.user, c.user);
        assert_eq!(verified.role, c.role);
    }

    #[test]
    fn test_different_tokens() {
        let jwt = JWT::new(vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 0]);
        let token_a = jwt.gen_token(&claim("a")).unwrap();
        let token_b = jwt.gen_token(&claim("b")).unwrap();
        let a: Claim = jwt.verify_token(&token_a).unwrap();
        let b: Claim = jwt.verify_token(&token_b).unwrap();
        assert_eq!(a.user, "a");
        assert_eq!(b.user, "b");
    }
}
