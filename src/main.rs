use recipebook::{app, state::AppState, MIGRATOR};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    recipebook::init_tracing();

    let app_state = AppState::init().await?;

    MIGRATOR.run(&app_state.db).await?;
    tracing::info!("migrations applied");

    app::serve(app::build_app(app_state)).await
}
