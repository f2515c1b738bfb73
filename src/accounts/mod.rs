//! User accounts - credentials, sessions, login throttling and staff-id binding
//!
//! The store does not check who is calling. Disable, enable and delete are
//! restricted to system administrators by the HTTP layer.

pub mod password;
mod session;
mod throttle;

pub use session::{Session, SessionTable};
pub use throttle::{LoginThrottle, MAX_ATTEMPTS, WINDOW_MINUTES};

use std::collections::BTreeMap;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::authz::{Jurisdiction, Principal, Role, ScopeName};
use crate::errors::{AppError, AppResult};
use crate::events::Loggable;
use crate::jwt::JwtConfig;
use crate::staff::{
    cross_validate, scope_for_role, NewStaff, SignupClaim, StaffBinding, StaffDirectory, StaffIdBindings,
    StaffRecord, StaffVerification,
};
use crate::utils::{sanitize_email, sanitize_text};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Option<Role>,
    #[serde(default)]
    pub region: Option<ScopeName>,
    #[serde(default)]
    pub district: Option<ScopeName>,
    /// Argon2 PHC string, or a legacy SHA-256 hex digest until the next login.
    #[serde(default)]
    pub password_hash: Option<String>,
    /// Plaintext one-time password issued by an administrator.
    #[serde(default)]
    pub temp_password: Option<String>,
    #[serde(default)]
    pub must_change_password: bool,
    #[serde(default)]
    pub staff_id: Option<String>,
    #[serde(default)]
    pub disabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub last_login_at: Option<DateTime<Utc>>,
}

impl UserAccount {
    pub fn jurisdiction(&self) -> Jurisdiction {
        Jurisdiction::new(self.region.clone(), self.district.clone())
    }

    pub fn principal(&self) -> Principal {
        let principal = Principal::new(self.id).with_jurisdiction(self.jurisdiction());
        match self.role {
            Some(role) => principal.with_role(role),
            None => principal,
        }
    }
}

impl Loggable for UserAccount {
    fn entity_type() -> &'static str {
        "user"
    }

    fn subject_id(&self) -> String {
        self.id.to_string()
    }
}

/// Self-service registration input.
#[derive(Debug, Clone)]
pub struct Signup {
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: Role,
    pub region: Option<String>,
    pub district: Option<String>,
    pub staff_id: Option<String>,
}

/// Administrator-created account; receives a temporary password.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub role: Role,
    pub region: Option<String>,
    pub district: Option<String>,
    pub staff_id: Option<String>,
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static pattern"))
}

fn normalize_email(raw: &str) -> AppResult<String> {
    let email = sanitize_email(raw);
    if !email_pattern().is_match(&email) {
        return Err(AppError::bad_request("invalid email address"));
    }
    Ok(email)
}

#[derive(Debug, Default)]
pub struct AccountStore {
    accounts: BTreeMap<Uuid, UserAccount>,
    sessions: SessionTable,
    throttle: LoginThrottle,
}

impl AccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(accounts: Vec<UserAccount>, sessions: Vec<Session>) -> Self {
        Self {
            accounts: accounts.into_iter().map(|a| (a.id, a)).collect(),
            sessions: SessionTable::from_sessions(sessions),
            throttle: LoginThrottle::new(),
        }
    }

    pub fn users_snapshot(&self) -> Vec<UserAccount> {
        self.accounts.values().cloned().collect()
    }

    pub fn sessions_snapshot(&self) -> Vec<Session> {
        self.sessions.snapshot()
    }

    pub fn get(&self, user_id: Uuid) -> Option<&UserAccount> {
        self.accounts.get(&user_id)
    }

    pub fn find_by_email(&self, email: &str) -> Option<&UserAccount> {
        let email = sanitize_email(email);
        self.accounts.values().find(|a| a.email == email)
    }

    pub fn find_by_staff_id(&self, staff_id: &str) -> Option<&UserAccount> {
        self.accounts
            .values()
            .find(|a| a.staff_id.as_deref() == Some(staff_id))
    }

    pub fn list(&self) -> Vec<&UserAccount> {
        let mut accounts: Vec<&UserAccount> = self.accounts.values().collect();
        accounts.sort_by(|a, b| a.email.cmp(&b.email));
        accounts
    }

    pub fn login(
        &mut self,
        keys: &JwtConfig,
        email: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> AppResult<(Session, UserAccount)> {
        let email = sanitize_email(email);
        self.throttle.record_attempt(&email, now)?;

        let account = self
            .accounts
            .values_mut()
            .find(|a| a.email == email)
            .ok_or(AppError::InvalidCredentials)?;

        if account.disabled {
            return Err(AppError::AccountDisabled);
        }

        let used_temp = account.temp_password.as_deref() == Some(password);
        if used_temp {
            // The temporary password becomes the (hashed) permanent one and must be
            // replaced before anything else is allowed.
            account.password_hash = Some(password::hash_password(password)?);
            account.temp_password = None;
            account.must_change_password = true;
            tracing::info!(user_id = %account.id, "temporary password consumed");
        } else {
            let stored = account.password_hash.as_deref().ok_or(AppError::InvalidCredentials)?;
            if !password::verify_password(password, stored)? {
                return Err(AppError::InvalidCredentials);
            }
            if password::is_legacy_hash(stored) {
                account.password_hash = Some(password::hash_password(password)?);
                tracing::info!(user_id = %account.id, "upgraded legacy password hash");
            }
        }

        account.last_login_at = Some(now);
        account.updated_at = now;
        let user = account.clone();

        self.throttle.clear(&email);
        let session = self.sessions.issue(keys, user.id, now)?;
        tracing::info!(user_id = %user.id, "login succeeded");
        Ok((session, user))
    }

    pub fn signup(
        &mut self,
        directory: &mut StaffDirectory,
        keys: &JwtConfig,
        request: Signup,
        now: DateTime<Utc>,
    ) -> AppResult<(Session, UserAccount)> {
        let email = normalize_email(&request.email)?;
        password::validate_strength(&request.password)?;

        let claim = SignupClaim {
            name: sanitize_text(&request.name),
            role: request.role,
            region: ScopeName::parse_opt(request.region.as_deref()),
            district: ScopeName::parse_opt(request.district.as_deref()),
            staff_id: request.staff_id.map(|id| sanitize_text(&id)),
        };
        let identity = cross_validate(directory, &claim)?;

        self.ensure_email_available(&email)?;
        if let Some(staff_id) = identity.binding.staff_id() {
            self.ensure_staff_id_unbound(staff_id)?;
        }

        let password_hash = password::hash_password(&request.password)?;

        if let StaffBinding::NewCustom(id) = &identity.binding {
            directory.add_staff_id(
                NewStaff {
                    name: identity.name.clone(),
                    role: Some(identity.role),
                    region: identity.jurisdiction.region.clone(),
                    district: identity.jurisdiction.district.clone(),
                    custom_id: Some(id.clone()),
                },
                now,
            )?;
        }

        let account = UserAccount {
            id: Uuid::new_v4(),
            email,
            name: identity.name,
            role: Some(identity.role),
            region: identity.jurisdiction.region,
            district: identity.jurisdiction.district,
            password_hash: Some(password_hash),
            temp_password: None,
            must_change_password: false,
            staff_id: identity.binding.staff_id().map(String::from),
            disabled: false,
            created_at: now,
            updated_at: now,
            last_login_at: Some(now),
        };
        self.accounts.insert(account.id, account.clone());

        let session = self.sessions.issue(keys, account.id, now)?;
        tracing::info!(user_id = %account.id, role = %identity.role, "account registered");
        Ok((session, account))
    }

    /// Creates an account with a temporary password, returned alongside it.
    /// Never creates a system_admin; that takes `create_system_admin`.
    pub fn add_user(
        &mut self,
        directory: &StaffDirectory,
        request: NewUser,
        now: DateTime<Utc>,
    ) -> AppResult<(UserAccount, String)> {
        if request.role == Role::SystemAdmin {
            return Err(AppError::forbidden("system_admin accounts cannot be created through user management"));
        }

        let email = normalize_email(&request.email)?;
        let mut name = sanitize_text(&request.name);
        let region = ScopeName::parse_opt(request.region.as_deref());
        let district = ScopeName::parse_opt(request.district.as_deref());
        let staff_id = request
            .staff_id
            .map(|id| sanitize_text(&id))
            .filter(|id| !id.is_empty());

        self.ensure_email_available(&email)?;

        // Administrators may only bind ids that already exist in the directory.
        let jurisdiction = match &staff_id {
            Some(id) => {
                if !matches!(directory.verify_staff_id(id), StaffVerification::Registered(_)) {
                    return Err(AppError::InvalidStaffId(format!("{id} is not registered")));
                }
                self.ensure_staff_id_unbound(id)?;
                let claim = SignupClaim {
                    name: name.clone(),
                    role: request.role,
                    region,
                    district,
                    staff_id: Some(id.clone()),
                };
                let identity = cross_validate(directory, &claim)?;
                name = identity.name;
                identity.jurisdiction
            }
            None if request.role.is_ranked() && request.role != Role::GlobalEngineer => {
                return Err(AppError::StaffIdRequired(request.role.to_string()));
            }
            None => scope_for_role(request.role, region, district)?,
        };

        if name.is_empty() {
            return Err(AppError::bad_request("name is required"));
        }

        let temp = password::generate_temp_password();
        let account = UserAccount {
            id: Uuid::new_v4(),
            email,
            name,
            role: Some(request.role),
            region: jurisdiction.region,
            district: jurisdiction.district,
            password_hash: None,
            temp_password: Some(temp.clone()),
            must_change_password: true,
            staff_id,
            disabled: false,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        };
        self.accounts.insert(account.id, account.clone());

        tracing::info!(user_id = %account.id, role = %request.role, "account created by administrator");
        Ok((account, temp))
    }

    /// Direct creation of a system administrator, used by the bootstrap CLI.
    pub fn create_system_admin(
        &mut self,
        email: &str,
        name: &str,
        new_password: &str,
        now: DateTime<Utc>,
    ) -> AppResult<UserAccount> {
        let email = normalize_email(email)?;
        password::validate_strength(new_password)?;
        self.ensure_email_available(&email)?;

        let name = sanitize_text(name);
        if name.is_empty() {
            return Err(AppError::bad_request("name is required"));
        }

        let account = UserAccount {
            id: Uuid::new_v4(),
            email,
            name,
            role: Some(Role::SystemAdmin),
            region: None,
            district: None,
            password_hash: Some(password::hash_password(new_password)?),
            temp_password: None,
            must_change_password: false,
            staff_id: None,
            disabled: false,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        };
        self.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    pub fn reset_password(&mut self, email: &str, new_password: &str, now: DateTime<Utc>) -> AppResult<UserAccount> {
        password::validate_strength(new_password)?;
        let email = sanitize_email(email);
        let account = self
            .accounts
            .values_mut()
            .find(|a| a.email == email)
            .ok_or_else(|| AppError::not_found(format!("no account for {email}")))?;

        account.password_hash = Some(password::hash_password(new_password)?);
        account.temp_password = None;
        account.must_change_password = false;
        account.updated_at = now;
        Ok(account.clone())
    }

    pub fn change_password(
        &mut self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
        now: DateTime<Utc>,
    ) -> AppResult<UserAccount> {
        let account = self
            .accounts
            .get(&user_id)
            .ok_or_else(|| AppError::not_found("user not found"))?;

        let current_ok = match account.password_hash.as_deref() {
            Some(hash) => password::verify_password(current_password, hash)?,
            None => account.temp_password.as_deref() == Some(current_password),
        };
        if !current_ok {
            return Err(AppError::InvalidCredentials);
        }
        if current_password == new_password {
            return Err(AppError::weak_password("new password must differ from the current one"));
        }

        let email = account.email.clone();
        self.reset_password(&email, new_password, now)
    }

    pub fn disable(&mut self, user_id: Uuid, now: DateTime<Utc>) -> AppResult<UserAccount> {
        let account = self.set_disabled(user_id, true, now)?;
        let revoked = self.sessions.revoke_user(user_id);
        tracing::info!(user_id = %user_id, revoked, "account disabled");
        Ok(account)
    }

    pub fn enable(&mut self, user_id: Uuid, now: DateTime<Utc>) -> AppResult<UserAccount> {
        self.set_disabled(user_id, false, now)
    }

    pub fn delete_account(&mut self, user_id: Uuid) -> AppResult<UserAccount> {
        let removed = self
            .accounts
            .remove(&user_id)
            .ok_or_else(|| AppError::not_found("user not found"))?;
        self.sessions.revoke_user(user_id);
        tracing::info!(user_id = %user_id, "account deleted");
        Ok(removed)
    }

    pub fn validate_session(
        &self,
        keys: &JwtConfig,
        token: &str,
        now: DateTime<Utc>,
    ) -> AppResult<(&Session, &UserAccount)> {
        let session = self.sessions.resolve(keys, token, now)?;
        let account = self
            .accounts
            .get(&session.user_id)
            .ok_or_else(|| AppError::unauthorized("account no longer exists"))?;
        if account.disabled {
            return Err(AppError::AccountDisabled);
        }
        Ok((session, account))
    }

    pub fn logout(&mut self, session_id: &str) -> bool {
        self.sessions.revoke(session_id)
    }

    pub fn rotate_csrf(&mut self, session_id: &str, now: DateTime<Utc>) -> AppResult<Session> {
        self.sessions.rotate_csrf(session_id, now)
    }

    pub fn purge_expired_sessions(&mut self, now: DateTime<Utc>) -> usize {
        self.sessions.purge_expired(now)
    }

    /// Copies role and scope from a changed staff record onto the account bound to it.
    pub fn sync_staff_record(&mut self, record: &StaffRecord, now: DateTime<Utc>) -> Option<UserAccount> {
        let account = self
            .accounts
            .values_mut()
            .find(|a| a.staff_id.as_deref() == Some(record.id.as_str()))?;

        account.name = record.name.clone();
        account.role = Some(record.role);
        account.region = record.region.clone();
        account.district = record.district.clone();
        account.updated_at = now;
        tracing::info!(user_id = %account.id, staff_id = %record.id, "account scope synced from staff record");
        Some(account.clone())
    }

    fn set_disabled(&mut self, user_id: Uuid, disabled: bool, now: DateTime<Utc>) -> AppResult<UserAccount> {
        let account = self
            .accounts
            .get_mut(&user_id)
            .ok_or_else(|| AppError::not_found("user not found"))?;
        account.disabled = disabled;
        account.updated_at = now;
        Ok(account.clone())
    }

    fn ensure_email_available(&self, email: &str) -> AppResult<()> {
        if self.accounts.values().any(|a| a.email == email) {
            return Err(AppError::DuplicateEmail(email.to_string()));
        }
        Ok(())
    }

    fn ensure_staff_id_unbound(&self, staff_id: &str) -> AppResult<()> {
        if self.is_bound(staff_id) {
            return Err(AppError::DuplicateStaffId(staff_id.to_string()));
        }
        Ok(())
    }
}

impl StaffIdBindings for AccountStore {
    fn is_bound(&self, staff_id: &str) -> bool {
        self.find_by_staff_id(staff_id).is_some()
    }
}
