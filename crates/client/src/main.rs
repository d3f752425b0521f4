use anyhow::{Context, bail};
use quorum_auth::RoleFacts;
use quorum_client::{App, ClientConfig};

const USAGE: &str = "usage: quorum-client [boot | login | logout | refresh | set-tenant <slug> | clear-tenant]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ClientConfig::from_env();
    quorum_observability::init(config.log_format);

    let app = App::build(&config)?;

    let mut args = std::env::args().skip(1);
    let command = args.next().unwrap_or_else(|| "boot".to_string());

    match command.as_str() {
        "set-tenant" => {
            let slug = args.next().context(USAGE)?;
            app.resolver().set_dev_override(&slug)?;
            println!("{}", serde_json::to_string_pretty(&app.resolver().resolve(&config.hostname))?);
            return Ok(());
        }
        "clear-tenant" => {
            app.resolver().clear_dev_override()?;
            println!("{}", serde_json::to_string_pretty(&app.resolver().resolve(&config.hostname))?);
            return Ok(());
        }
        "boot" | "login" | "logout" | "refresh" => {}
        other => bail!("unknown command {other:?}\n{USAGE}"),
    }

    app.start().await?;

    match command.as_str() {
        "login" => {
            let credential = config
                .credential
                .clone()
                .context("QUORUM_CREDENTIAL must be set for login")?;
            app.session()
                .login(credential, config.platform_operator)
                .await
                .context("login failed")?;
        }
        "logout" => app.session().logout().context("logout did not clear the stored credential")?,
        "refresh" => app.session().refresh_user().await.context("refresh failed")?,
        _ => {}
    }

    let snapshot = app.snapshot(&RoleFacts::new()).await;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    app.shutdown();
    Ok(())
}
