//! Basic example demonstrating record expansion and named parameters
//!
//! Run with: cargo run --example basic
//!
//! Uses an in-memory SQLite database, so no setup is required.

use std::collections::HashMap;

use sqlx::{Connection, SqliteConnection};
use sqlx_record_bind::{record, Dest, Querier, QueryArg, Value};

record! {
    #[derive(Debug, Default, PartialEq)]
    struct User {
        id: i64 => "id",
        name: String => "name",
        email: String => "email",
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Connecting to database...");
    let mut conn = SqliteConnection::connect("sqlite::memory:").await?;

    println!("\nCreating users table...");
    sqlx::query(
        "CREATE TABLE users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE
        )",
    )
    .execute(&mut conn)
    .await?;

    // The hook observes every compiled statement before it runs.
    let mut querier = Querier::new();
    querier.hook(|stmt| println!("  sql> {}", stmt));

    // Example 1: Insert with named parameters
    println!("\n--- Example 1: Inserting users ---");
    let users_to_insert = vec![
        ("Alice", "alice@example.com"),
        ("Bob", "bob@example.com"),
        ("Charlie", "charlie@example.com"),
    ];

    for (name, email) in users_to_insert {
        let mut args = HashMap::new();
        args.insert("name".to_string(), Value::from(name));
        args.insert("email".to_string(), Value::from(email));

        let result = querier
            .exec(
                &mut conn,
                "INSERT INTO users (name, email) VALUES (:name, :email);",
                &[QueryArg::map(&args)],
            )
            .await?;
        println!("Inserted user '{}': {} row(s)", name, result.rows_affected());
    }

    // Example 2: Record expansion instead of a column list
    println!("\n--- Example 2: Finding a user by email ---");
    let mut args = HashMap::new();
    args.insert("email".to_string(), Value::from("alice@example.com"));

    let mut user = User::default();
    let mut query = querier.for_one(vec![Dest::record(&mut user)])?;
    query
        .query(
            &mut conn,
            "SELECT {User} FROM users WHERE email=:email;",
            &[QueryArg::map(&args)],
        )
        .await?;
    drop(query);
    println!("Found user: {} ({})", user.name, user.email);

    // Example 3: Accumulating every row into a Vec
    println!("\n--- Example 3: Fetching all users ---");
    let mut users: Vec<User> = Vec::new();
    let mut query = querier.for_many(vec![Dest::list(&mut users)])?;
    query
        .query(&mut conn, "SELECT {User} FROM users;", &[])
        .await?;
    drop(query);

    println!("Found {} users:", users.len());
    for user in &users {
        println!("  - {} (id={}, email={})", user.name, user.id, user.email);
    }

    // Example 4: Scalar destinations
    println!("\n--- Example 4: Counting users ---");
    let mut count = 0i64;
    let mut query = querier.for_one(vec![Dest::scalar(&mut count)])?;
    query
        .query(&mut conn, "SELECT COUNT(id) FROM users;", &[])
        .await?;
    drop(query);
    println!("{} users total", count);

    // Example 5: Update and delete with named parameters
    println!("\n--- Example 5: Updating and deleting ---");
    let mut args = HashMap::new();
    args.insert("name".to_string(), Value::from("Robert"));
    args.insert("email".to_string(), Value::from("bob@example.com"));
    let result = querier
        .exec(
            &mut conn,
            "UPDATE users SET name=:name WHERE email=:email;",
            &[QueryArg::map(&args)],
        )
        .await?;
    println!("Updated {} row(s)", result.rows_affected());

    let mut args = HashMap::new();
    args.insert("email".to_string(), Value::from("charlie@example.com"));
    let result = querier
        .exec(
            &mut conn,
            "DELETE FROM users WHERE email=:email;",
            &[QueryArg::map(&args)],
        )
        .await?;
    println!("Deleted {} row(s)", result.rows_affected());

    println!("\nExample completed successfully!");
    Ok(())
}
