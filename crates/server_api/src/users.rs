//! Account management. Everything here except [`current_user`], [`bootstrap_admin`]
//! and [`provision_user`] is admin-only.

use std::collections::BTreeMap;

use shared::{
    domain::{Role, UserId},
    error::{ApiError, ErrorCode},
    protocol::{CreateUserRequest, UpdateUserRequest, UserSummary},
};

use storage::Storage;

use crate::{
    internal,
    password::{hash_password, validate_password_strength},
    summary_from_stored, Actor, ApiContext,
};

/// Profile of the acting user, re-read from storage.
pub async fn current_user(ctx: &ApiContext, actor: &Actor) -> Result<UserSummary, ApiError> {
    ctx.storage
        .load_user(actor.user_id)
        .await
        .map_err(internal)?
        .map(summary_from_stored)
        .ok_or_else(|| ApiError::new(ErrorCode::Unauthorized, "account no longer exists"))
}

pub async fn list_users(ctx: &ApiContext, actor: &Actor) -> Result<Vec<UserSummary>, ApiError> {
    actor.ensure_admin()?;
    let users = ctx.storage.list_users().await.map_err(internal)?;
    Ok(users.into_iter().map(summary_from_stored).collect())
}

pub async fn create_user(
    ctx: &ApiContext,
    actor: &Actor,
    req: &CreateUserRequest,
) -> Result<UserSummary, ApiError> {
    actor.ensure_admin()?;
    let created =
        provision_user(&ctx.storage, &req.name, &req.email, &req.password, req.role).await?;
    tracing::info!(
        user_id = created.id.0,
        role = %created.role,
        actor = actor.user_id.0,
        "user created"
    );
    Ok(created)
}

pub async fn update_user(
    ctx: &ApiContext,
    actor: &Actor,
    id: UserId,
    req: &UpdateUserRequest,
) -> Result<UserSummary, ApiError> {
    actor.ensure_admin()?;
    let name = req.name.trim();
    if name.is_empty() {
        return Err(field_error("name", "Name is required"));
    }
    if id == actor.user_id && !req.role.is_admin() {
        return Err(ApiError::new(
            ErrorCode::Conflict,
            "You cannot remove your own admin role",
        ));
    }

    let updated = ctx
        .storage
        .update_user(id, name, req.role)
        .await
        .map_err(internal)?
        .ok_or_else(|| user_not_found(id))?;
    tracing::info!(user_id = id.0, role = %updated.role, actor = actor.user_id.0, "user updated");
    Ok(summary_from_stored(updated))
}

/// Submissions created by the removed user keep existing with no creator.
pub async fn delete_user(ctx: &ApiContext, actor: &Actor, id: UserId) -> Result<(), ApiError> {
    actor.ensure_admin()?;
    if id == actor.user_id {
        return Err(ApiError::new(
            ErrorCode::Conflict,
            "You cannot delete your own account",
        ));
    }
    if !ctx.storage.delete_user(id).await.map_err(internal)? {
        return Err(user_not_found(id));
    }
    tracing::info!(user_id = id.0, actor = actor.user_id.0, "user deleted");
    Ok(())
}

/// Creates the first admin account when the user table is empty. Returns `None` otherwise.
pub async fn bootstrap_admin(
    ctx: &ApiContext,
    name: &str,
    email: &str,
    password: &str,
) -> Result<Option<UserSummary>, ApiError> {
    if ctx.storage.count_users().await.map_err(internal)? > 0 {
        return Ok(None);
    }
    let admin = provision_user(&ctx.storage, name, email, password, Role::Admin).await?;
    tracing::info!(user_id = admin.id.0, email = %admin.email, "bootstrap admin created");
    Ok(Some(admin))
}

/// Validates and stores a new account without an actor check. Admin routes, the
/// first-run bootstrap and the operator CLI all create accounts through here.
pub async fn provision_user(
    storage: &Storage,
    name: &str,
    email: &str,
    password: &str,
    role: Role,
) -> Result<UserSummary, ApiError> {
    let name = name.trim();
    let email = email.trim();

    let mut fields = BTreeMap::new();
    if name.is_empty() {
        fields.insert("name".to_string(), "Name is required".to_string());
    }
    if email.is_empty() || !email.contains('@') {
        fields.insert("email".to_string(), "A valid email is required".to_string());
    }
    if let Err(message) = validate_password_strength(password) {
        fields.insert("password".to_string(), message);
    }
    if !fields.is_empty() {
        return Err(ApiError::validation(fields));
    }

    if storage
        .find_user_by_email(email)
        .await
        .map_err(internal)?
        .is_some()
    {
        return Err(ApiError::new(
            ErrorCode::Conflict,
            format!("A user with email {email} already exists"),
        ));
    }

    let hash = hash_password(password).map_err(|e| {
        ApiError::new(ErrorCode::Internal, format!("failed to hash password: {e}"))
    })?;
    let stored = storage
        .create_user(name, email, role, &hash)
        .await
        .map_err(internal)?;
    Ok(summary_from_stored(stored))
}

fn field_error(field: &str, message: &str) -> ApiError {
    ApiError::validation(BTreeMap::from([(field.to_string(), message.to_string())]))
}

fn user_not_found(id: UserId) -> ApiError {
    ApiError::new(ErrorCode::NotFound, format!("user {id} not found"))
}

#[cfg(test)]
#[path = "tests/users_tests.rs"]
mod tests;
