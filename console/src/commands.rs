use admin_session::auth::{login, logout, LoginRequest};
use admin_session::overlay::features::FeatureAssignments;
use admin_session::{
    AccessGuard, Banner, EditOverlay, FeatureRecord, GuardState, Navigator, RequestGateway,
};
use anyhow::{anyhow, bail, Result};
use std::cell::RefCell;
use tracing::info;

//--------------------------------------------------------------------------------------------------
// Shared context handed to every command
//--------------------------------------------------------------------------------------------------

pub struct Context {
    gateway: RequestGateway,
    login_path: String,
}

impl Context {
    pub fn new(gateway: RequestGateway, login_path: impl Into<String>) -> Self {
        Self {
            gateway,
            login_path: login_path.into(),
        }
    }
}

// There is no browser to send anywhere, so remember where we would have gone
#[derive(Default)]
struct RedirectNotice(RefCell<Option<String>>);

impl Navigator for RedirectNotice {
    fn redirect(&self, path: &str) {
        *self.0.borrow_mut() = Some(path.to_string());
    }
}

//--------------------------------------------------------------------------------------------------
// Session commands
//--------------------------------------------------------------------------------------------------

pub async fn sign_in(ctx: &Context, email: String, password: String) -> Result<()> {
    let session = login(&ctx.gateway, &LoginRequest { email, password }).await?;
    println!("Signed in as {}", session.display_name());
    Ok(())
}

pub async fn sign_out(ctx: &Context) -> Result<()> {
    logout(&ctx.gateway).await;
    println!("Signed out");
    Ok(())
}

pub fn whoami(ctx: &Context, roles: Vec<String>) -> Result<()> {
    let notice = RedirectNotice::default();
    let mut guard = AccessGuard::new(ctx.gateway.store().clone(), &notice)
        .with_login_path(ctx.login_path.clone())
        .require_any_role(roles);

    match guard.activate() {
        GuardState::Authenticated(session) => {
            println!("{}", session.display_name());
            if let Some(email) = &session.email {
                println!("  email:   {}", email);
            }
            if let Some(role) = &session.role {
                println!("  role:    {}", role);
            }
            if let Some(expires_at) = session.expires_at {
                println!("  expires: {}", expires_at);
            }
            Ok(())
        }
        GuardState::Forbidden(session) => bail!(
            "{} does not have a required role (see {})",
            session.display_name(),
            redirect_target(&notice)
        ),
        GuardState::Unauthenticated | GuardState::Unknown => {
            bail!("Not signed in (see {})", redirect_target(&notice))
        }
    }
}

fn redirect_target(notice: &RedirectNotice) -> String {
    notice.0.borrow().clone().unwrap_or_default()
}

//--------------------------------------------------------------------------------------------------
// Feature toggles
//--------------------------------------------------------------------------------------------------

pub async fn list_features(ctx: &Context, institution: String) -> Result<()> {
    let source = FeatureAssignments::new(ctx.gateway.clone(), institution);
    let overlay = EditOverlay::<FeatureRecord>::default();
    overlay.refresh(&source).await?;

    for record in overlay.baseline() {
        println!("{:<32} {}", record.key, on_off(record.enabled));
    }
    Ok(())
}

pub async fn set_features(ctx: &Context, institution: String, toggles: Vec<String>) -> Result<()> {
    let toggles = toggles
        .iter()
        .map(|raw| parse_toggle(raw))
        .collect::<Result<Vec<_>>>()?;

    let source = FeatureAssignments::new(ctx.gateway.clone(), institution);
    let overlay = EditOverlay::<FeatureRecord>::default();
    overlay.refresh(&source).await?;

    let baseline = overlay.baseline();
    for (key, enabled) in &toggles {
        let record = baseline
            .iter()
            .find(|r| &r.key == key)
            .ok_or_else(|| anyhow!("Unknown feature {}", key))?;
        overlay.stage(&record.id, *enabled)?;
    }

    for record in &baseline {
        if let Some(enabled) = overlay.pending().get(&record.id) {
            println!(
                "{:<32} {} -> {}",
                record.key,
                on_off(record.enabled),
                on_off(*enabled)
            );
        }
    }
    if !overlay.is_dirty() {
        info!("Nothing differs from the current assignments, saving anyway");
    }

    let result = overlay.commit(&source).await;
    match overlay.banner() {
        Some(Banner::Success(message)) => println!("{}", message),
        Some(Banner::Error(message)) => eprintln!("{}", message),
        None => {}
    }
    result?;
    Ok(())
}

fn parse_toggle(raw: &str) -> Result<(String, bool)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("Expected key=on|off, got {}", raw))?;
    let enabled = match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "1" => true,
        "off" | "false" | "0" => false,
        other => bail!("Expected on or off for {}, got {}", key, other),
    };
    if key.is_empty() {
        bail!("Missing feature key in {}", raw);
    }
    Ok((key.to_string(), enabled))
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

//--------------------------------------------------------------------------------------------------
