//! Account methods: `auth.register`, `auth.login`, `auth.validate`.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use tracing::{info, instrument};

use hive_auth::{hash_password, verify_password};
use hive_store::{NewUser, StoreError};

use crate::error::RpcError;
use crate::handlers::require_params;
use crate::methods::{Caller, MethodHandler, RpcContext};
use crate::rpc::{optional_str, require_str};

/// Just enough shape checking to catch typos, not RFC 5322.
static EMAIL_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex"));

const MIN_USERNAME_LEN: usize = 3;
const MIN_PASSWORD_LEN: usize = 8;

pub struct RegisterHandler;

#[async_trait]
impl MethodHandler for RegisterHandler {
    #[instrument(skip_all, fields(method = "auth.register"))]
    async fn handle(
        &self,
        params: Option<Value>,
        _caller: &Caller,
        ctx: &RpcContext,
    ) -> Result<Value, RpcError> {
        let params = require_params(params)?;
        let email = require_str(&params, "email")?.trim();
        let username = require_str(&params, "username")?.trim();
        let password = require_str(&params, "password")?;
        let first_name = optional_str(&params, "firstName")?.unwrap_or_default();
        let last_name = optional_str(&params, "lastName")?.unwrap_or_default();

        if !EMAIL_SHAPE.is_match(email) {
            return Err(RpcError::InvalidArgument(format!(
                "Invalid email address '{email}'"
            )));
        }
        if username.chars().count() < MIN_USERNAME_LEN {
            return Err(RpcError::InvalidArgument(format!(
                "Username must be at least {MIN_USERNAME_LEN} characters"
            )));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(RpcError::InvalidArgument(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let hashed = hash_password(password)?;
        let record = ctx.users.create(&NewUser {
            email: email.to_string(),
            username: username.to_string(),
            password_hash: hashed.hash,
            password_salt: hashed.salt,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        })?;

        let user = record.to_user();
        let token = ctx.signer.mint(&user)?;
        info!(user_id = %user.id, %username, "user registered");
        Ok(json!({ "user": user, "token": token }))
    }
}

pub struct LoginHandler;

#[async_trait]
impl MethodHandler for LoginHandler {
    #[instrument(skip_all, fields(method = "auth.login"))]
    async fn handle(
        &self,
        params: Option<Value>,
        _caller: &Caller,
        ctx: &RpcContext,
    ) -> Result<Value, RpcError> {
        let params = require_params(params)?;
        let identifier = require_str(&params, "identifier")?;
        let password = require_str(&params, "password")?;

        let record = ctx.users.get_by_identifier(identifier)?;
        if !verify_password(password, &record.password_hash, &record.password_salt)? {
            return Err(RpcError::PermissionDenied("Wrong password".into()));
        }

        let user = record.to_user();
        let token = ctx.signer.mint(&user)?;
        info!(user_id = %user.id, "user logged in");
        Ok(json!({ "user": user, "token": token }))
    }
}

pub struct ValidateHandler;

#[async_trait]
impl MethodHandler for ValidateHandler {
    #[instrument(skip_all, fields(method = "auth.validate"))]
    async fn handle(
        &self,
        params: Option<Value>,
        _caller: &Caller,
        ctx: &RpcContext,
    ) -> Result<Value, RpcError> {
        let params = require_params(params)?;
        let token = require_str(&params, "token")?;

        let identity = ctx.signer.verify(token)?;
        // A signed token for a user the store no longer knows is a stale
        // credential, not a missing resource.
        let record = match ctx.users.get(&identity.user_id) {
            Ok(record) => record,
            Err(StoreError::NotFound(_)) => {
                return Err(RpcError::Unauthenticated("Unknown user".into()))
            }
            Err(other) => return Err(other.into()),
        };

        Ok(json!({ "valid": true, "user": record.to_user() }))
    }
}
