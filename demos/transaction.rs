//! Transaction example demonstrating queries and execs inside transactions
//!
//! Run with: cargo run --example transaction
//!
//! Uses an in-memory SQLite database, so no setup is required.

use std::collections::HashMap;

use sqlx::{Connection, Sqlite, SqliteConnection, Transaction};
use sqlx_record_bind::{record, Dest, Querier, QueryArg, Value};

record! {
    #[derive(Debug, Default, PartialEq)]
    struct Account {
        id: i64 => "id",
        name: String => "name",
        balance: i64 => "balance",
    }
}

async fn transfer_money(
    querier: &Querier,
    tx: &mut Transaction<'_, Sqlite>,
    from_id: i64,
    to_id: i64,
    amount: i64,
) -> Result<(), Box<dyn std::error::Error>> {
    println!(
        "  Transferring ${} from account {} to account {}",
        amount, from_id, to_id
    );

    // Debit from source account
    let mut args = HashMap::new();
    args.insert("amount".to_string(), Value::from(amount));
    args.insert("id".to_string(), Value::from(from_id));
    let result = querier
        .exec(
            &mut **tx,
            "UPDATE accounts SET balance = balance - :amount WHERE id = :id;",
            &[QueryArg::map(&args)],
        )
        .await?;
    if result.rows_affected() == 0 {
        return Err("Source account not found".into());
    }

    // Check for negative balance
    let mut args = HashMap::new();
    args.insert("id".to_string(), Value::from(from_id));
    let mut balance = 0i64;
    let mut query = querier.for_one(vec![Dest::scalar(&mut balance)])?;
    query
        .query(
            &mut **tx,
            "SELECT balance FROM accounts WHERE id = :id;",
            &[QueryArg::map(&args)],
        )
        .await?;
    drop(query);
    if balance < 0 {
        return Err(format!("Insufficient funds (balance: ${})", balance).into());
    }

    // Credit to destination account
    let mut args = HashMap::new();
    args.insert("amount".to_string(), Value::from(amount));
    args.insert("id".to_string(), Value::from(to_id));
    let result = querier
        .exec(
            &mut **tx,
            "UPDATE accounts SET balance = balance + :amount WHERE id = :id;",
            &[QueryArg::map(&args)],
        )
        .await?;
    if result.rows_affected() == 0 {
        return Err("Destination account not found".into());
    }

    println!("  Transfer completed successfully");
    Ok(())
}

async fn show_accounts(
    querier: &Querier,
    conn: &mut SqliteConnection,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut accounts: Vec<Account> = Vec::new();
    let mut query = querier.for_many(vec![Dest::list(&mut accounts)])?;
    query
        .query(conn, "SELECT {Account} FROM accounts ORDER BY id;", &[])
        .await?;
    drop(query);

    println!("\nCurrent account balances:");
    for account in &accounts {
        println!(
            "  {} (id={}): ${}",
            account.name, account.id, account.balance
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Connecting to database...");
    let mut conn = SqliteConnection::connect("sqlite::memory:").await?;

    println!("\nSetting up accounts table...");
    sqlx::query(
        "CREATE TABLE accounts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            balance INTEGER NOT NULL DEFAULT 0
        )",
    )
    .execute(&mut conn)
    .await?;

    let querier = Querier::new();

    println!("\nCreating test accounts...");
    let accounts = vec![("Alice", 1000i64), ("Bob", 500), ("Charlie", 750)];
    for (name, balance) in accounts {
        let mut args = HashMap::new();
        args.insert("name".to_string(), Value::from(name));
        args.insert("balance".to_string(), Value::from(balance));
        querier
            .exec(
                &mut conn,
                "INSERT INTO accounts (name, balance) VALUES (:name, :balance);",
                &[QueryArg::map(&args)],
            )
            .await?;
    }

    show_accounts(&querier, &mut conn).await?;

    // Example 1: Successful transaction
    println!("\n--- Example 1: Successful transfer ---");
    let mut tx = conn.begin().await?;
    match transfer_money(&querier, &mut tx, 1, 2, 200).await {
        Ok(_) => {
            tx.commit().await?;
            println!("  Transaction committed");
        }
        Err(e) => {
            tx.rollback().await?;
            println!("  Transaction rolled back: {}", e);
        }
    }
    show_accounts(&querier, &mut conn).await?;

    // Example 2: Failed transaction (insufficient funds)
    println!("\n--- Example 2: Failed transfer (insufficient funds) ---");
    let mut tx = conn.begin().await?;
    match transfer_money(&querier, &mut tx, 2, 1, 1000).await {
        Ok(_) => {
            tx.commit().await?;
            println!("  Transaction committed");
        }
        Err(e) => {
            tx.rollback().await?;
            println!("  Transaction rolled back: {}", e);
        }
    }
    show_accounts(&querier, &mut conn).await?;

    // Example 3: Multiple transfers in one transaction
    println!("\n--- Example 3: Multiple transfers in one transaction ---");
    let mut tx = conn.begin().await?;

    let transfers = vec![
        (1, 3, 100), // Alice -> Charlie
        (3, 2, 50),  // Charlie -> Bob
    ];

    let mut success = true;
    for (from, to, amount) in transfers {
        if let Err(e) = transfer_money(&querier, &mut tx, from, to, amount).await {
            println!("  Transfer failed: {}", e);
            success = false;
            break;
        }
    }

    if success {
        tx.commit().await?;
        println!("  All transfers committed");
    } else {
        tx.rollback().await?;
        println!("  All transfers rolled back");
    }
    show_accounts(&querier, &mut conn).await?;

    println!("\nExample completed successfully!");
    Ok(())
}
