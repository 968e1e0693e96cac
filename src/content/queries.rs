// SQL for users, posts, images and follows
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashSet;

use crate::db;
use crate::db::models::{Image, Post, User};
use crate::notify::{StoreError, UserId};
use crate::state::DbPool;

fn row_to_post(row: &Row) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        user_id: UserId(row.get(1)?),
        content: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn select_post(conn: &Connection, post_id: i64) -> Result<Option<Post>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT id, user_id, content, created_at FROM posts WHERE id = ?1",
            params![post_id],
            row_to_post,
        )
        .optional()?)
}

/// One statement, so a failed call leaves no row behind
pub(super) fn insert_user(pool: &DbPool, username: &str) -> Result<User, StoreError> {
    let conn = pool.get()?;
    let user = conn.query_row(
        "INSERT INTO users (username) VALUES (?1) RETURNING id, username, created_at",
        params![username],
        |row| {
            Ok(User {
                id: UserId(row.get(0)?),
                username: row.get(1)?,
                created_at: row.get(2)?,
            })
        },
    )?;
    Ok(user)
}

pub(super) fn user_exists(pool: &DbPool, user: UserId) -> Result<bool, StoreError> {
    let conn = pool.get()?;
    let exists = conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE id = ?1",
        params![user.get()],
        |row| row.get(0),
    )?;
    Ok(exists)
}

pub(super) fn delete_user(pool: &DbPool, user: UserId) -> Result<bool, StoreError> {
    let conn = pool.get()?;
    let deleted = conn.execute("DELETE FROM users WHERE id = ?1", params![user.get()])?;
    Ok(deleted > 0)
}

/// Post plus `image_count` image slots, in one transaction
pub(super) fn insert_post(
    pool: &DbPool,
    author: UserId,
    content: &str,
    image_count: u32,
) -> Result<(Post, Vec<Image>), StoreError> {
    let conn = pool.get()?;

    db::immediate_transaction(&conn, |tx| {
        tx.execute(
            "INSERT INTO posts (user_id, content) VALUES (?1, ?2)",
            params![author.get(), content],
        )?;
        let post_id = tx.last_insert_rowid();

        let mut images = Vec::with_capacity(image_count as usize);
        for position in 0..i64::from(image_count) {
            tx.execute(
                "INSERT INTO images (post_id, position) VALUES (?1, ?2)",
                params![post_id, position],
            )?;
            images.push(Image {
                id: tx.last_insert_rowid(),
                post_id,
                position,
            });
        }

        let post = select_post(tx, post_id)?
            .ok_or_else(|| StoreError::Corrupt(format!("post {} vanished mid-insert", post_id)))?;
        Ok((post, images))
    })
}

pub(super) fn find_post(pool: &DbPool, post_id: i64) -> Result<Option<Post>, StoreError> {
    let conn = pool.get()?;
    select_post(&conn, post_id)
}

pub(super) fn post_ids_by_user(pool: &DbPool, user: UserId) -> Result<Vec<i64>, StoreError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare("SELECT id FROM posts WHERE user_id = ?1")?;
    let ids = stmt
        .query_map(params![user.get()], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

pub(super) fn delete_post(pool: &DbPool, post_id: i64) -> Result<(), StoreError> {
    let conn = pool.get()?;
    conn.execute("DELETE FROM posts WHERE id = ?1", params![post_id])?;
    Ok(())
}

pub(super) fn image_ids_for_post(pool: &DbPool, post_id: i64) -> Result<Vec<i64>, StoreError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare("SELECT id FROM images WHERE post_id = ?1 ORDER BY position")?;
    let ids = stmt
        .query_map(params![post_id], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

pub(super) fn image_ids_by_user(pool: &DbPool, user: UserId) -> Result<Vec<i64>, StoreError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT i.id FROM images i JOIN posts p ON p.id = i.post_id WHERE p.user_id = ?1",
    )?;
    let ids = stmt
        .query_map(params![user.get()], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

/// Owner of the post an image belongs to
pub(super) fn image_owner(pool: &DbPool, image_id: i64) -> Result<Option<UserId>, StoreError> {
    let conn = pool.get()?;
    let owner: Option<i64> = conn
        .query_row(
            "SELECT p.user_id FROM images i JOIN posts p ON p.id = i.post_id WHERE i.id = ?1",
            params![image_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(owner.map(UserId))
}

pub(super) fn delete_image(pool: &DbPool, image_id: i64) -> Result<(), StoreError> {
    let conn = pool.get()?;
    conn.execute("DELETE FROM images WHERE id = ?1", params![image_id])?;
    Ok(())
}

pub(super) fn followers_of(pool: &DbPool, user: UserId) -> Result<HashSet<UserId>, StoreError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare("SELECT follower_id FROM follows WHERE followee_id = ?1")?;
    let followers = stmt
        .query_map(params![user.get()], |row| row.get(0).map(UserId))?
        .collect::<Result<HashSet<_>, _>>()?;
    Ok(followers)
}

/// Flip the follow edge. Returns true if `follower` now follows `followee`.
pub(super) fn toggle_follow(
    pool: &DbPool,
    follower: UserId,
    followee: UserId,
) -> Result<bool, StoreError> {
    let conn = pool.get()?;

    db::immediate_transaction(&conn, |tx| {
        let removed = tx.execute(
            "DELETE FROM follows WHERE follower_id = ?1 AND followee_id = ?2",
            params![follower.get(), followee.get()],
        )?;
        if removed > 0 {
            return Ok(false);
        }

        tx.execute(
            "INSERT OR IGNORE INTO follows (follower_id, followee_id) VALUES (?1, ?2)",
            params![follower.get(), followee.get()],
        )?;
        Ok(true)
    })
}
