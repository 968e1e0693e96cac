use rand::Rng;
use rusqlite::{params, OptionalExtension};

use crate::notify::{StoreError, UserId};
use crate::state::DbPool;

/// Create a new session for a user. Returns the session token.
pub fn create_session(pool: &DbPool, user: UserId, hours: u64) -> Result<String, StoreError> {
    let conn = pool.get()?;
    let token = generate_token();

    conn.execute(
        "INSERT INTO sessions (token, user_id, expires_at) VALUES (?1, ?2, datetime('now', ?3))",
        params![token, user.get(), format!("+{} hours", hours)],
    )?;

    tracing::debug!(user = %user, "Session created");
    Ok(token)
}

/// User behind an unexpired session token
pub fn session_user(pool: &DbPool, token: &str) -> Result<Option<(UserId, String)>, StoreError> {
    let conn = pool.get()?;
    let user = conn
        .query_row(
            "SELECT u.id, u.username FROM sessions s \
             JOIN users u ON u.id = s.user_id \
             WHERE s.token = ?1 AND s.expires_at > datetime('now')",
            params![token],
            |row| Ok((UserId(row.get(0)?), row.get(1)?)),
        )
        .optional()?;
    Ok(user)
}

/// Delete a session by token.
pub fn delete_session(pool: &DbPool, token: &str) -> Result<(), StoreError> {
    let conn = pool.get()?;
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(())
}

/// `Set-Cookie` value for a fresh session
pub fn session_cookie(cookie_name: &str, token: &str, hours: u64) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        cookie_name,
        token,
        hours * 3600
    )
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::testing::seeded_pool;

    #[test]
    fn generate_token_is_64_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generate_token_is_unique() {
        let t1 = generate_token();
        let t2 = generate_token();
        assert_ne!(t1, t2);
    }

    #[test]
    fn session_resolves_to_user_until_deleted() {
        let (pool, _temp) = seeded_pool();
        let token = create_session(&pool, UserId(2), 1).unwrap();

        assert_eq!(
            session_user(&pool, &token).unwrap(),
            Some((UserId(2), "bob".to_string()))
        );

        delete_session(&pool, &token).unwrap();
        assert_eq!(session_user(&pool, &token).unwrap(), None);
    }

    #[test]
    fn expired_session_is_ignored() {
        let (pool, _temp) = seeded_pool();
        let token = create_session(&pool, UserId(1), 0).unwrap();
        pool.get()
            .unwrap()
            .execute(
                "UPDATE sessions SET expires_at = datetime('now', '-1 hours') WHERE token = ?1",
                params![token],
            )
            .unwrap();

        assert_eq!(session_user(&pool, &token).unwrap(), None);
    }

    #[test]
    fn session_cookie_format() {
        let cookie = session_cookie("kinfeed_session", "abc", 2);
        assert_eq!(
            cookie,
            "kinfeed_session=abc; HttpOnly; SameSite=Strict; Path=/; Max-Age=7200"
        );
    }
}
