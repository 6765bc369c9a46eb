/// Account lifecycle endpoints
///
/// This module provides the verification-code-gated account flows:
///
/// - Registration: request a code, then register with email + password + code
/// - Password reset: request a code, then overwrite the password with it
/// - Phone login: request a code, then log in passwordless (the account is
///   created on first login)
/// - Password login: identifier + password, with opportunistic rehashing
///
/// Every flow that consumes a code does so inside the same database
/// transaction as the state transition the code gates. A crash or
/// conflict between the two rolls both back: no account is ever created
/// without its code being consumed, and no code is ever consumed without
/// its account mutation committing.
///
/// # Endpoints
///
/// - `POST /v1/auth/register_with_code` - Register with email code
/// - `POST /v1/auth/register/email/code` - Send registration code
/// - `POST /v1/auth/password/forgot` - Request a reset code
/// - `POST /v1/auth/password/reset` - Reset password with code
/// - `POST /v1/auth/phone/code` - Send phone login code
/// - `POST /v1/auth/phone/login` - Passwordless phone login
/// - `POST /v1/auth/login` - Password login
/// - `GET /v1/auth/me` - Current account (authenticated)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::OkResponse,
};
use axum::{extract::State, Extension, Json};
use chrono::Duration;
use pointgate_shared::{
    auth::{jwt, password},
    models::{
        user::{CreateUser, User},
        verification_code::{CodePurpose, VerificationCode},
    },
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// How long a registration code stays valid
const REGISTER_CODE_TTL_MINUTES: i64 = 5;

/// How long a password-reset code stays valid
const RESET_CODE_TTL_MINUTES: i64 = 10;

/// How long a phone-login code stays valid
const PHONE_CODE_TTL_MINUTES: i64 = 5;

/// Register-with-code request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterWithCodeRequest {
    /// Email address the code was sent to
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Password for the new account
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    /// The 6-digit verification code
    #[validate(length(equal = 6, message = "Code must be 6 digits"))]
    pub code: String,
}

/// Email-only request (send registration code, forgot password)
#[derive(Debug, Deserialize, Validate)]
pub struct EmailRequest {
    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

/// Password reset confirmation request
#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    /// Email address of the account
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// The 6-digit reset code
    #[validate(length(equal = 6, message = "Code must be 6 digits"))]
    pub code: String,

    /// Replacement password
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub new_password: String,
}

/// Phone-only request (send phone login code)
#[derive(Debug, Deserialize, Validate)]
pub struct PhoneRequest {
    /// Phone number in E.164-ish form
    #[validate(length(min = 5, max = 20, message = "Invalid phone number"))]
    pub phone: String,
}

/// Phone login confirmation request
#[derive(Debug, Deserialize, Validate)]
pub struct PhoneLoginRequest {
    /// Phone number the code was sent to
    #[validate(length(min = 5, max = 20, message = "Invalid phone number"))]
    pub phone: String,

    /// The 6-digit login code
    #[validate(length(equal = 6, message = "Code must be 6 digits"))]
    pub code: String,
}

/// Password login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// "email" or "phone"
    #[serde(default = "default_identifier_type")]
    pub identifier_type: String,

    /// The email address or phone number
    #[validate(length(min = 1, message = "Identifier must not be empty"))]
    pub identifier: String,

    /// Password
    #[validate(length(min = 1, message = "Password must not be empty"))]
    pub password: String,
}

fn default_identifier_type() -> String {
    "email".to_string()
}

/// Successful login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    /// Account ID
    pub user_id: String,

    /// Bearer token (1 hour)
    pub access_token: String,

    /// Always "bearer"
    pub token_type: String,
}

/// Registers a new account with an email verification code
///
/// The code consumption and the account creation run in one transaction.
/// The uniqueness pre-check gives a friendly error, but the database
/// unique index is what actually closes the race: when two concurrent
/// registrations for the same email both hold a valid code, one insert
/// commits and the other rolls back - taking its code consumption with it.
///
/// # Errors
///
/// - `400 Bad Request`: invalid or expired code
/// - `409 Conflict`: email already registered
/// - `422 Unprocessable Entity`: validation failed
pub async fn register_with_code(
    State(state): State<AppState>,
    Json(req): Json<RegisterWithCodeRequest>,
) -> ApiResult<Json<OkResponse>> {
    req.validate()?;

    let mut txn = state.db.begin().await?;

    VerificationCode::validate_and_consume(&mut txn, CodePurpose::Register, &req.email, &req.code)
        .await?;

    if User::find_by_email(&mut *txn, &req.email).await?.is_some() {
        return Err(ApiError::Conflict("email already registered".to_string()));
    }

    let password_hash = password::hash_password(&req.password)?;

    let user = User::create(
        &mut *txn,
        CreateUser {
            email: Some(req.email.clone()),
            phone: None,
            password_hash,
        },
    )
    .await?;

    txn.commit().await?;

    tracing::info!(user_id = %user.id, "Account registered");

    Ok(Json(OkResponse::new()))
}

/// Sends a registration code to an email address
///
/// Refuses to send for an already-registered email, matching the
/// registration endpoint's conflict behavior.
///
/// # Errors
///
/// - `409 Conflict`: email already registered
/// - `503 Service Unavailable`: the code was stored but could not be delivered
pub async fn send_register_code(
    State(state): State<AppState>,
    Json(req): Json<EmailRequest>,
) -> ApiResult<Json<OkResponse>> {
    req.validate()?;

    if User::find_by_email(&state.db, &req.email).await?.is_some() {
        return Err(ApiError::Conflict("email already registered".to_string()));
    }

    state
        .codes
        .issue(
            CodePurpose::Register,
            &req.email,
            &req.email,
            Duration::minutes(REGISTER_CODE_TTL_MINUTES),
        )
        .await?;

    Ok(Json(OkResponse::new()))
}

/// Requests a password reset code
///
/// Always answers `{ok:true}`, whether or not the email is registered:
/// this endpoint must not let a caller enumerate which addresses have
/// accounts. The reset code is scoped to the account id, not to the
/// free-form email string.
///
/// # Errors
///
/// - `503 Service Unavailable`: the code was stored but could not be delivered
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<EmailRequest>,
) -> ApiResult<Json<OkResponse>> {
    req.validate()?;

    if let Some(user) = User::find_by_email(&state.db, &req.email).await? {
        state
            .codes
            .issue(
                CodePurpose::ResetPassword,
                &user.id.to_string(),
                &req.email,
                Duration::minutes(RESET_CODE_TTL_MINUTES),
            )
            .await?;
    } else {
        tracing::debug!("Password reset requested for unknown email");
    }

    Ok(Json(OkResponse::new()))
}

/// Resets a password with a verification code
///
/// The code consumption and the password overwrite run in one
/// transaction. An unknown email reports the same generic code error as a
/// wrong code, for the same anti-enumeration reason as `forgot_password`.
///
/// # Errors
///
/// - `400 Bad Request`: invalid or expired code
/// - `422 Unprocessable Entity`: validation failed
pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> ApiResult<Json<OkResponse>> {
    req.validate()?;

    let user = User::find_by_email(&state.db, &req.email)
        .await?
        .ok_or(ApiError::CodeInvalid)?;

    let mut txn = state.db.begin().await?;

    VerificationCode::validate_and_consume(
        &mut txn,
        CodePurpose::ResetPassword,
        &user.id.to_string(),
        &req.code,
    )
    .await?;

    let password_hash = password::hash_password(&req.new_password)?;
    User::update_password(&mut *txn, user.id, &password_hash).await?;

    txn.commit().await?;

    tracing::info!(user_id = %user.id, "Password reset");

    Ok(Json(OkResponse::new()))
}

/// Sends a phone login code
///
/// Unlike the registration flow this does not care whether the phone
/// number already has an account - the login confirmation creates one on
/// demand.
///
/// # Errors
///
/// - `503 Service Unavailable`: the code was stored but could not be delivered
pub async fn send_phone_code(
    State(state): State<AppState>,
    Json(req): Json<PhoneRequest>,
) -> ApiResult<Json<OkResponse>> {
    req.validate()?;

    state
        .codes
        .issue(
            CodePurpose::PhoneLogin,
            &req.phone,
            &req.phone,
            Duration::minutes(PHONE_CODE_TTL_MINUTES),
        )
        .await?;

    Ok(Json(OkResponse::new()))
}

/// Passwordless phone login
///
/// Consumes the login code and finds-or-creates the account for the phone
/// number in the same transaction, so repeated logins are idempotent and a
/// consumed code always corresponds to a committed account. New accounts
/// carry an empty password hash and can only authenticate through this
/// flow.
///
/// # Errors
///
/// - `400 Bad Request`: invalid or expired code
/// - `403 Forbidden`: account disabled
pub async fn phone_login(
    State(state): State<AppState>,
    Json(req): Json<PhoneLoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    req.validate()?;

    let mut txn = state.db.begin().await?;

    VerificationCode::validate_and_consume(&mut txn, CodePurpose::PhoneLogin, &req.phone, &req.code)
        .await?;

    let user = match User::find_by_phone(&mut *txn, &req.phone).await? {
        Some(user) => user,
        None => {
            User::create(
                &mut *txn,
                CreateUser {
                    email: None,
                    phone: Some(req.phone.clone()),
                    password_hash: String::new(),
                },
            )
            .await?
        }
    };

    if !user.is_active {
        // Rolling back leaves the code unconsumed.
        return Err(ApiError::Forbidden("account disabled".to_string()));
    }

    txn.commit().await?;

    User::update_last_login(&state.db, user.id).await?;

    let token = jwt::create_token(&jwt::Claims::new(user.id), state.jwt_secret())?;

    tracing::info!(user_id = %user.id, "Phone login");

    Ok(Json(LoginResponse {
        user_id: user.id.to_string(),
        access_token: token,
        token_type: "bearer".to_string(),
    }))
}

/// Password login
///
/// Looks the account up by email or phone, verifies the password with a
/// constant-time comparison, and transparently rehashes stored hashes that
/// use outdated parameters. Unknown identifier, wrong password, and
/// password-less (phone-only) accounts all produce the same 401.
///
/// # Errors
///
/// - `401 Unauthorized`: invalid credentials
/// - `403 Forbidden`: account disabled
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    req.validate()?;

    let user = match req.identifier_type.as_str() {
        "email" => User::find_by_email(&state.db, &req.identifier).await?,
        "phone" => User::find_by_phone(&state.db, &req.identifier).await?,
        other => {
            return Err(ApiError::BadRequest(format!(
                "unsupported identifier_type '{}'",
                other
            )))
        }
    };

    let user =
        user.ok_or_else(|| ApiError::Unauthorized("invalid email or password".to_string()))?;

    if !user.has_password() {
        return Err(ApiError::Unauthorized(
            "invalid email or password".to_string(),
        ));
    }

    let (valid, new_hash) = password::verify_and_update(&req.password, &user.password_hash)?;
    if !valid {
        return Err(ApiError::Unauthorized(
            "invalid email or password".to_string(),
        ));
    }

    if !user.is_active {
        return Err(ApiError::Forbidden("account disabled".to_string()));
    }

    // Opportunistic upgrade of outdated hashes
    if let Some(new_hash) = new_hash {
        User::update_password(&state.db, user.id, &new_hash).await?;
        tracing::debug!(user_id = %user.id, "Password hash upgraded");
    }

    User::update_last_login(&state.db, user.id).await?;

    let token = jwt::create_token(&jwt::Claims::new(user.id), state.jwt_secret())?;

    Ok(Json(LoginResponse {
        user_id: user.id.to_string(),
        access_token: token,
        token_type: "bearer".to_string(),
    }))
}

/// Returns the authenticated account
///
/// The password hash is never serialized.
pub async fn me(Extension(user): Extension<User>) -> ApiResult<Json<User>> {
    Ok(Json(user))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_request_default_identifier_type() {
        let req: LoginRequest =
            serde_json::from_str(r#"{"identifier": "a@x.com", "password": "p"}"#).unwrap();
        assert_eq!(req.identifier_type, "email");
    }

    #[test]
    fn test_register_request_validation() {
        let req = RegisterWithCodeRequest {
            email: "not-an-email".to_string(),
            password: "longenough".to_string(),
            code: "123456".to_string(),
        };
        assert!(req.validate().is_err());

        let req = RegisterWithCodeRequest {
            email: "a@x.com".to_string(),
            password: "short".to_string(),
            code: "123456".to_string(),
        };
        assert!(req.validate().is_err());

        let req = RegisterWithCodeRequest {
            email: "a@x.com".to_string(),
            password: "longenough".to_string(),
            code: "12345".to_string(),
        };
        assert!(req.validate().is_err());

        let req = RegisterWithCodeRequest {
            email: "a@x.com".to_string(),
            password: "longenough".to_string(),
            code: "123456".to_string(),
        };
        assert!(req.validate().is_ok());
    }
}
