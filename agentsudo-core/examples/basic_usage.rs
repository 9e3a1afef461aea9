//! Basic Usage Example
//!
//! Three agents with different permission levels call the same guarded
//! operations on a user table:
//!
//! 1. **ReadOnlyBot** - can only read
//! 2. **SupportBot** - can read and update
//! 3. **AdminBot** - can do everything, via a wildcard grant
//!
//! Run with: cargo run --example basic_usage
//! Show audit records with: RUST_LOG=agentsudo=debug cargo run --example basic_usage

use agentsudo_core::{Agent, Guard, PermissionDenied};
use serde_json::{json, Value};

struct UserTable {
    get: Guard,
    update: Guard,
    delete: Guard,
}

impl UserTable {
    fn new() -> Self {
        Self {
            get: Guard::new("read:users").named("get_user"),
            update: Guard::new("write:users").named("update_user"),
            delete: Guard::new("delete:users").named("delete_user"),
        }
    }

    fn get_user(&self, user_id: &str) -> Result<Value, PermissionDenied> {
        self.get.invoke(|| {
            println!("  reading user {user_id}");
            json!({"id": user_id, "name": "Alice", "email": "alice@example.com"})
        })
    }

    fn update_user(&self, user_id: &str, data: Value) -> Result<Value, PermissionDenied> {
        self.update.invoke(|| {
            println!("  updating user {user_id} with {data}");
            json!({"success": true})
        })
    }

    fn delete_user(&self, user_id: &str) -> Result<Value, PermissionDenied> {
        self.delete.invoke(|| {
            println!("  deleting user {user_id}");
            json!({"success": true})
        })
    }
}

fn report(result: Result<Value, PermissionDenied>) {
    match result {
        Ok(value) => println!("  allowed: {value}"),
        Err(e) => println!("  blocked: {e}"),
    }
}

fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("agentsudo=info"))?;
    tracing_subscriber::fmt().with_env_filter(filter).compact().init();

    let users = UserTable::new();

    let readonly = Agent::new("ReadOnlyBot", ["read:users"]);
    let support = Agent::new("SupportBot", ["read:users", "write:users"]);
    let admin = Agent::new("AdminBot", ["*:users"]);

    println!("--- Scenario 1: ReadOnly Agent ---");
    {
        let _session = readonly.enter_session();
        report(users.get_user("user_123"));
        report(users.update_user("user_123", json!({"name": "Bob"})));
    }

    println!("\n--- Scenario 2: Support Agent ---");
    {
        let _session = support.enter_session();
        report(users.get_user("user_456"));
        report(users.update_user("user_456", json!({"email": "new@example.com"})));
        report(users.delete_user("user_456"));
    }

    println!("\n--- Scenario 3: Admin Agent ---");
    {
        let _session = admin.enter_session();
        report(users.get_user("user_789"));
        report(users.update_user("user_789", json!({"status": "inactive"})));
        report(users.delete_user("user_789"));
    }

    println!("\n--- Scenario 4: No Session ---");
    report(users.get_user("user_000"));

    Ok(())
}
