// session-store/src/console.rs
//! Line-oriented front-end standing in for the header, user menu and auth modal.

use common::{NewCampaign, ProfileUpdate};
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::forms::{SignInForm, SignUpForm};
use crate::handle::SessionHandle;
use crate::state::ProfileStatus;

pub const HELP: &str = "\
Commands:
  signup <email> <password> <full name>   create an account
  signin <email> <password>               sign in
  signout                                 sign out
  whoami                                  show the signed-in user
  name <full name>                        change display name
  avatar <url>                            change avatar
  repair [full name]                      recreate a missing profile
  refresh                                 refresh the session tokens
  campaigns                               list saved campaigns
  save <type> <name>                      save an empty campaign draft
  delete <id>                             delete a saved campaign
  help                                    show this help
  quit                                    exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SignUp(SignUpForm),
    SignIn(SignInForm),
    SignOut,
    WhoAmI,
    Rename(String),
    Avatar(String),
    Repair(Option<String>),
    Refresh,
    Campaigns,
    Save { kind: String, name: String },
    Delete(Uuid),
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}', try 'help'")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("invalid campaign id '{0}'")]
    InvalidId(String),
    #[error("avatar must be an http(s) URL")]
    InvalidUrl,
}

fn rest(words: &[&str]) -> Option<String> {
    let joined = words.join(" ");
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let (name, args) = words.split_first().ok_or(CommandError::Empty)?;

        match (name.to_lowercase().as_str(), args) {
            ("signup", [email, password, full_name @ ..]) if !full_name.is_empty() => {
                Ok(Self::SignUp(SignUpForm {
                    display_name: full_name.join(" "),
                    email: email.to_string(),
                    password: password.to_string(),
                }))
            }
            ("signup", _) => Err(CommandError::Usage("signup <email> <password> <full name>")),
            ("signin", [email, password]) => Ok(Self::SignIn(SignInForm {
                email: email.to_string(),
                password: password.to_string(),
            })),
            ("signin", _) => Err(CommandError::Usage("signin <email> <password>")),
            ("signout", []) => Ok(Self::SignOut),
            ("whoami", []) => Ok(Self::WhoAmI),
            ("name", words) => rest(words)
                .map(Self::Rename)
                .ok_or(CommandError::Usage("name <full name>")),
            ("avatar", [url]) => match Url::parse(url) {
                Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {
                    Ok(Self::Avatar(parsed.to_string()))
                }
                _ => Err(CommandError::InvalidUrl),
            },
            ("avatar", _) => Err(CommandError::Usage("avatar <url>")),
            ("repair", words) => Ok(Self::Repair(rest(words))),
            ("refresh", []) => Ok(Self::Refresh),
            ("campaigns", []) => Ok(Self::Campaigns),
            ("save", [kind, name @ ..]) if !name.is_empty() => Ok(Self::Save {
                kind: kind.to_string(),
                name: name.join(" "),
            }),
            ("save", _) => Err(CommandError::Usage("save <type> <name>")),
            ("delete", [id]) => Uuid::parse_str(id)
                .map(Self::Delete)
                .map_err(|_| CommandError::InvalidId(id.to_string())),
            ("delete", _) => Err(CommandError::Usage("delete <id>")),
            ("help", _) => Ok(Self::Help),
            ("quit", _) | ("exit", _) => Ok(Self::Quit),
            (other, _) => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

/// One-line description of who is signed in
pub fn describe(handle: &SessionHandle) -> String {
    let snapshot = handle.snapshot();
    if snapshot.is_initializing() {
        return "Loading session...".to_string();
    }
    let status = match snapshot.profile_status() {
        None => return "Not signed in".to_string(),
        Some(ProfileStatus::Loading) => "profile loading",
        Some(ProfileStatus::Ready) => "profile ready",
        Some(ProfileStatus::Unavailable) => "profile unavailable",
    };

    let email = snapshot
        .identity()
        .map(|identity| identity.email.clone())
        .unwrap_or_default();

    format!(
        "[{}] {} <{}> ({})",
        snapshot.badge_initial(),
        snapshot.menu_label(),
        email,
        status
    )
}

/// Run one command against the store and render the outcome
pub async fn execute(handle: &SessionHandle, command: Command) -> String {
    match command {
        Command::SignUp(form) => {
            if let Err(e) = form.validate() {
                return format!("Error: {}", e);
            }
            match handle
                .register(form.email.trim(), &form.password, form.display_name.trim())
                .await
            {
                Ok(registration) => match registration.profile_error {
                    None => format!("Account created for {}", registration.identity.email),
                    Some(e) => format!(
                        "Account created for {}, but {}. Run 'repair' to retry.",
                        registration.identity.email, e
                    ),
                },
                Err(e) => format!("Error: {}", e),
            }
        }
        Command::SignIn(form) => {
            if let Err(e) = form.validate() {
                return format!("Error: {}", e);
            }
            match handle.authenticate(form.email.trim(), &form.password).await {
                Ok(identity) => format!("Signed in as {}", identity.email),
                Err(e) => format!("Error: {}", e),
            }
        }
        Command::SignOut => match handle.end_session().await {
            Ok(()) => "Signed out".to_string(),
            Err(e) => format!("Error: {}", e),
        },
        Command::WhoAmI => describe(handle),
        Command::Rename(name) => render_unit(
            handle.update_profile(ProfileUpdate::display_name(name)).await,
            "Display name updated",
        ),
        Command::Avatar(url) => render_unit(
            handle.update_profile(ProfileUpdate::avatar(url)).await,
            "Avatar updated",
        ),
        Command::Repair(display_name) => match handle.create_profile(display_name).await {
            Ok(profile) => format!("Profile saved for {}", profile.email),
            Err(e) => format!("Error: {}", e),
        },
        Command::Refresh => render_unit(handle.refresh_session().await, "Session refreshed"),
        Command::Campaigns => match handle.list_campaigns().await {
            Ok(campaigns) if campaigns.is_empty() => "No saved campaigns".to_string(),
            Ok(campaigns) => campaigns
                .iter()
                .map(|c| {
                    format!(
                        "{}  {:<10} {}  ({})",
                        c.id,
                        c.kind,
                        c.name,
                        c.created_at.format("%Y-%m-%d %H:%M")
                    )
                })
                .collect::<Vec<_>>()
                .join("\n"),
            Err(e) => format!("Error: {}", e),
        },
        Command::Save { kind, name } => match handle.save_campaign(NewCampaign::new(kind, name)).await {
            Ok(saved) => format!("Saved campaign {}", saved.id),
            Err(e) => format!("Error: {}", e),
        },
        Command::Delete(id) => render_unit(handle.delete_campaign(id).await, "Campaign deleted"),
        Command::Help => HELP.to_string(),
        Command::Quit => "Bye".to_string(),
    }
}

fn render_unit(result: Result<(), crate::error::SessionError>, success: &str) -> String {
    match result {
        Ok(()) => success.to_string(),
        Err(e) => format!("Error: {}", e),
    }
}
