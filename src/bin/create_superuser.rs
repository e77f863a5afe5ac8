//! Creates a staff + superuser account from the command line.

use anyhow::Context;
use clap::Parser;
use recipebook::{
    auth::password::hash_password,
    users::{
        dto::UserRequest,
        repo::{NewUserRow, User},
        services::validate_user,
    },
    MIGRATOR,
};

#[derive(Debug, Parser)]
#[command(name = "create-superuser", about = "Create an admin account")]
struct Args {
    #[arg(long)]
    email: String,
    /// Read from SUPERUSER_PASSWORD when omitted.
    #[arg(long, env = "SUPERUSER_PASSWORD", hide_env_values = true)]
    password: String,
    #[arg(long, default_value = "Admin")]
    name: String,
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    recipebook::init_tracing();
    let args = Args::parse();

    let changes = validate_user(
        UserRequest {
            email: Some(args.email),
            password: Some(args.password),
            name: Some(args.name),
        },
        true,
    )
    .map_err(|errors| anyhow::anyhow!("invalid input: {}", serde_json::to_string(&errors).unwrap_or_default()))?;
    let (Some(email), Some(name), Some(password)) = (changes.email, changes.name, changes.password)
    else {
        anyhow::bail!("email, name and password are required");
    };

    let db = sqlx::postgres::PgPoolOptions::new()
        .max_connections(1)
        .connect(&args.database_url)
        .await
        .context("connect to database")?;
    MIGRATOR.run(&db).await?;

    if User::find_by_email(&db, &email).await?.is_some() {
        anyhow::bail!("user with email {email} already exists");
    }

    let hash = hash_password(&password)?;
    let user = User::create(
        &db,
        &NewUserRow {
            email: &email,
            name: &name,
            password_hash: &hash,
            is_staff: true,
            is_superuser: true,
        },
    )
    .await?;

    tracing::info!(user_id = %user.id, email = %user.email, "superuser created");
    Ok(())
}
