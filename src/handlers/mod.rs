pub mod form;
pub mod submission;

use actix_web::http::StatusCode;
use actix_web::web::{Data, Json};
use actix_web::HttpResponse;
use hex::ToHex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::models::user::{Insert as UserInsert, Role};
use crate::core::ports::repository::UserCommon;
use crate::core::ports::tokener::Tokener;
use crate::database::sqlx::PgSqlxManager;
use crate::error::Error;
use crate::impls::tokener::jwt::JWT;
use crate::middlewares::jwt::{Claim, JWT_SECRET};

fn hash_password(pass: &str, slt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(pass);
    hasher.update(slt);
    hasher.finalize().encode_hex()
}

fn random_salt() -> String {
    let chars = vec![
        '1', '2', '3', '4', '5', '6', '7', '8', '9', '0', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'A', 'B',
        'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z',
    ];
    let mut slt = String::new();
    let mut rng = rand::thread_rng();
    for _ in 0..32 {
        let i = rng.gen_range(0..chars.len());
        slt.push(chars[i]);
    }
    slt
}

#[derive(Debug, Deserialize)]
pub struct Login {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

pub async fn login(Json(Login { email, password }): Json<Login>, manager: Data<PgSqlxManager>) -> Result<Json<TokenResponse>, Error> {
    let mut store = manager.acquire().await?;
    let user = UserCommon::get_by_email(&mut store, &email)
        .await?
        .ok_or_else(|| Error::Forbidden("invalid email or password".into()))?;
    if hash_password(&password, &user.salt) != user.password {
        return Err(Error::Forbidden("invalid email or password".into()));
    }
    let claim = Claim {
        user: user.id.to_string(),
        role: user.role,
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp(),
    };
    let secret = dotenv::var(JWT_SECRET)?;
    let tokener = JWT::new(secret.as_bytes().to_owned());
    let token = tokener.gen_token(&claim)?;
    Ok(Json(TokenResponse { token }))
}

#[derive(Debug, Clone, Deserialize)]
pub struct Signup {
    nickname: String,
    email: String,
    password: String,
}

pub async fn signup(Json(Signup { nickname, email, password }): Json<Signup>, manager: Data<PgSqlxManager>) -> Result<HttpResponse, Error> {
    let mut store = manager.acquire().await?;
    if UserCommon::get_by_email(&mut store, &email).await?.is_some() {
        return Err(Error::Conflict("email already registered".into()));
    }
    let slt = random_salt();
    UserCommon::insert(
        &mut store,
        UserInsert {
            nickname,
            email,
            password: hash_password(&password, &slt),
            salt: slt,
            role: Role::User.as_str().into(),
        },
    )
    .await?;
    Ok(HttpResponse::build(StatusCode::CREATED).finish())
}
