//! accounts
//!
//! `aegis_game::accounts::AccountService` backed by a MySQL `account`
//! table. The cached `(salt, verifier)` pair loaded with the account row
//! is treated as authoritative and is never recomputed on login.

use aegis_game::accounts::{
    Account, AccountId, AccountOpError, AccountService, BanStatus, LoginChallenge, LoginFailure,
};
use aegis_srp::{
    password_hash, register, verify_reconnect_proof, Challenge, Proof, Salt, Verifier,
};
use async_trait::async_trait;
use rand::Rng;
use sqlx::{FromRow, MySqlPool};
use tracing::{debug, error, info, instrument};

#[derive(Debug, Clone)]
pub struct MySQLAccountService {
    pool: MySqlPool,
}

impl MySQLAccountService {
    pub fn new(pool: MySqlPool) -> Self {
        debug!("starting account service");
        Self { pool }
    }
}

#[derive(FromRow)]
struct AccountRow {
    id: u32,
    username: String,
    /// Hex digest of `SHA1(upper(user) || ":" || upper(pass))`; the only
    /// credential an imported account is guaranteed to carry.
    sha_pass_hash: String,
    salt: Option<Vec<u8>>,
    verifier: Option<Vec<u8>>,
    session_key: Option<Vec<u8>>,
    ban_status: Option<i8>,
}

impl AccountRow {
    /// The cached `(s, v)` pair, present only if both columns hold exactly
    /// 32 bytes. Anything else counts as a cache miss.
    fn sv_fields(&self) -> Option<(Salt, Verifier)> {
        let salt: [u8; 32] = self.salt.clone()?.try_into().ok()?;
        let verifier: [u8; 32] = self.verifier.clone()?.try_into().ok()?;
        Some((Salt(salt), Verifier(verifier)))
    }
}

impl TryFrom<AccountRow> for Account {
    type Error = AccountOpError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let (salt, verifier) = row
            .sv_fields()
            // an account that never completed a login has no cached pair;
            // every path that needs a real one goes through initiate_login
            .unwrap_or((Salt([0u8; 32]), Verifier([0u8; 32])));
        let session_key = row
            .session_key
            .map(|k| -> Result<[u8; 40], AccountOpError> {
                k.try_into()
                    .map_err(|_| AccountOpError::PersistError("malformed session key".into()))
            })
            .transpose()?;

        Ok(Account {
            id: AccountId(row.id),
            username: row.username,
            salt,
            verifier,
            ban_status: row.ban_status.map(|s| match s {
                0 => BanStatus::Temporary,
                _ => BanStatus::Permanent,
            }),
            session_key,
        })
    }
}

const ACCOUNT_COLUMNS: &str =
    "id, username, sha_pass_hash, salt, verifier, session_key, ban_status FROM account";

#[async_trait]
impl AccountService for MySQLAccountService {
    #[instrument(skip(self, password))]
    async fn create_account(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> Result<AccountId, AccountOpError> {
        if username.len() > 16 {
            return Err(AccountOpError::UsernameTooLong);
        }
        if password.len() > 16 {
            return Err(AccountOpError::PasswordTooLong);
        }

        let username = username.to_ascii_uppercase();
        let password = password.to_ascii_uppercase();

        let existing = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} WHERE username = ?"
        ))
        .bind(&username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AccountOpError::PersistError(e.to_string()))?;

        if existing.is_some() {
            return Err(AccountOpError::UsernameTaken);
        }

        let (salt, verifier) = register(&username, &password);
        let sha_pass_hash = hex::encode(password_hash(&username, &password));

        let result = sqlx::query(
            "INSERT INTO account(username, sha_pass_hash, salt, verifier, email, joindate) \
             VALUES(?, ?, ?, ?, ?, NOW())",
        )
        .bind(&username)
        .bind(&sha_pass_hash)
        .bind(&salt.0[..])
        .bind(&verifier.0[..])
        .bind(email)
        .execute(&self.pool)
        .await
        .map_err(|e| AccountOpError::PersistError(e.to_string()))?;

        Ok(AccountId(result.last_insert_id() as u32))
    }

    #[instrument(skip(self))]
    async fn delete_account(&self, id: AccountId) -> Result<(), AccountOpError> {
        let result = sqlx::query("DELETE FROM account WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| AccountOpError::PersistError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(AccountOpError::InvalidAccount(id));
        }

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_account(&self, username: &str) -> Result<Account, AccountOpError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} WHERE username = ?"
        ))
        .bind(username)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AccountOpError::PersistError(e.to_string()))?;

        row.try_into()
    }

    async fn initiate_login(&self, username: &str) -> Result<LoginChallenge, LoginFailure> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} WHERE username = ?"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("account lookup failed: {e}");
            LoginFailure::DatabaseError
        })?
        .ok_or(LoginFailure::UnknownAccount)?;

        match row.ban_status {
            Some(0) => {
                debug!(%username, "suspended account attempted login");
                return Err(LoginFailure::Suspended);
            }
            Some(_) => {
                debug!(%username, "banned account attempted login");
                return Err(LoginFailure::Banned);
            }
            None => {}
        }

        // the cached pair is authoritative; it is only ever derived when
        // the columns are empty, otherwise reconnect would break on every
        // login
        let (salt, verifier) = match row.sv_fields() {
            Some(pair) => pair,
            None => {
                let hash = hex::decode(row.sha_pass_hash.trim()).map_err(|_| {
                    error!(%username, "stored password hash is not hex");
                    LoginFailure::DatabaseError
                })?;
                let salt: Salt = rand::thread_rng().gen();
                let verifier = Verifier::from_stored_hash(&hash, &salt);

                sqlx::query("UPDATE account SET salt = ?, verifier = ? WHERE id = ?")
                    .bind(&salt.0[..])
                    .bind(&verifier.0[..])
                    .bind(row.id)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| {
                        error!("failed to persist derived (s, v): {e}");
                        LoginFailure::DatabaseError
                    })?;
                debug!(%username, "derived and cached a fresh (s, v) pair");
                (salt, verifier)
            }
        };

        Ok(LoginChallenge {
            account: AccountId(row.id),
            challenge: Challenge::new(&row.username, salt, verifier),
            security_flags: 0,
        })
    }

    async fn complete_login(
        &self,
        challenge: LoginChallenge,
        a_pub: &[u8; 32],
        client_m: &[u8; 20],
    ) -> Result<Proof, LoginFailure> {
        // a failed proof answers "unknown account", the same code an
        // unknown name gets, so the two cases can't be told apart
        let proof = challenge
            .challenge
            .verify_proof(a_pub, client_m)
            .ok_or(LoginFailure::UnknownAccount)?;

        sqlx::query("UPDATE account SET session_key = ?, last_login = NOW() WHERE id = ?")
            .bind(&proof.session_key[..])
            .bind(challenge.account.0)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!("failed to persist session key: {e}");
                LoginFailure::DatabaseError
            })?;

        info!(account = challenge.account.0, "login completed");
        Ok(proof)
    }

    async fn complete_reconnect(
        &self,
        username: &str,
        client_challenge: &[u8; 16],
        reconnect_proof: &[u8; 16],
        client_response: &[u8; 20],
    ) -> Result<(), LoginFailure> {
        let account = self
            .get_account(username)
            .await
            .map_err(|_| LoginFailure::UnknownAccount)?;

        let session_key = account.session_key.ok_or(LoginFailure::NoCachedSession)?;

        if verify_reconnect_proof(
            username,
            client_challenge,
            reconnect_proof,
            &session_key,
            client_response,
        ) {
            Ok(())
        } else {
            Err(LoginFailure::IncorrectPassword)
        }
    }

    async fn tutorial_data(&self, id: AccountId) -> Result<[u32; 8], AccountOpError> {
        let row = sqlx::query_as::<_, (u32, u32, u32, u32, u32, u32, u32, u32)>(
            "SELECT t0, t1, t2, t3, t4, t5, t6, t7 FROM account_tutorial WHERE account = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AccountOpError::PersistError(e.to_string()))?;

        // an account that never touched a tutorial has no row at all
        Ok(row
            .map(|(t0, t1, t2, t3, t4, t5, t6, t7)| [t0, t1, t2, t3, t4, t5, t6, t7])
            .unwrap_or_default())
    }

    #[instrument(skip(self, data))]
    async fn set_tutorial_data(
        &self,
        id: AccountId,
        data: [u32; 8],
    ) -> Result<(), AccountOpError> {
        let mut query = sqlx::query(
            "REPLACE INTO account_tutorial(account, t0, t1, t2, t3, t4, t5, t6, t7) \
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.0);
        for word in data {
            query = query.bind(word);
        }
        query
            .execute(&self.pool)
            .await
            .map_err(|e| AccountOpError::PersistError(e.to_string()))?;

        Ok(())
    }
}
