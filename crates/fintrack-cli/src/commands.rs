//! Command handlers.
//!
//! `App` wires the API client and both stores into a `SessionManager` and
//! runs one subcommand against it.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use chrono::{Local, NaiveDate};
use tracing::{debug, warn};

use fintrack_core::api::ApiClient;
use fintrack_core::auth::CredentialStore;
use fintrack_core::config::Config;
use fintrack_core::models::{is_uncategorized_name, NewBudget, NewCategory, NewTransaction};
use fintrack_core::session::SessionManager;
use fintrack_core::storage::{age_display, is_stale, FileStore};
use fintrack_core::utils::{format_amount, format_date, parse_date, truncate};

use crate::args::Commands;

/// Width of the description column in transaction listings
const DESCRIPTION_WIDTH: usize = 30;

/// Width of the label column in summaries
const LABEL_WIDTH: usize = 20;

/// Number of cells in a budget usage bar
const USAGE_BAR_WIDTH: usize = 10;

const MIN_USERNAME_LEN: usize = 3;
const MIN_PASSWORD_LEN: usize = 6;

pub struct App {
    config: Config,
    api: Arc<ApiClient>,
    session: SessionManager,
}

impl App {
    pub fn new(config: Config, base_url: &str) -> Result<Self> {
        let api = Arc::new(ApiClient::new(base_url)?);
        let durable = Arc::new(FileStore::new(config.storage_dir()?));
        let volatile = Arc::new(FileStore::new(config.volatile_dir()?));
        debug!(base_url, durable = %durable.dir().display(), volatile = %volatile.dir().display(), "Opening session storage");

        let session = SessionManager::new(api.clone(), durable, volatile);
        session.initialize();

        Ok(Self {
            config,
            api,
            session,
        })
    }

    pub async fn run(&mut self, command: Commands) -> Result<()> {
        match command {
            Commands::Login { username, remember } => self.login(username, remember).await,
            Commands::Register { username, email } => self.register(&username, &email).await,
            Commands::ResetPassword { identifier } => self.reset_password(identifier).await,
            Commands::Profile => self.profile().await,
            Commands::Logout { forget } => self.logout(forget),
            Commands::Status => self.status(),
            Commands::Refresh => self.refresh().await,
            Commands::Summary { recent } => self.summary(recent).await,
            Commands::AddExpense {
                amount,
                date,
                description,
                category,
            } => self.add_expense(amount, date, description, category).await,
            Commands::DeleteExpense { id } => self.delete_expense(id).await,
            Commands::AddBudget {
                category,
                limit,
                start,
                end,
            } => self.add_budget(&category, limit, &start, &end).await,
            Commands::Theme { name } => self.theme(name),
        }
    }

    pub fn dispose(&self) {
        self.session.dispose();
    }

    // ===== Session =====

    async fn login(&mut self, username: Option<String>, remember: bool) -> Result<()> {
        let username = match username {
            Some(username) => username,
            None => Self::prompt_username(self.config.last_username.as_deref())?,
        };

        let mut password = None;
        if let Some(stored) = CredentialStore::get_password(&username) {
            if Self::confirm("Use stored password? [Y/n]: ")? {
                password = Some(stored);
            }
        }
        let password = match password {
            Some(password) => password,
            None => rpassword::prompt_password("Password: ")?,
        };

        println!("Authenticating...");
        let session = self
            .session
            .authenticate(self.api.as_ref(), &username, &password)
            .await?;

        if remember {
            if let Err(e) = CredentialStore::store(&username, &password) {
                warn!(error = %e, "Failed to store credentials");
            }
        }

        self.config.last_username = Some(username);
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }

        println!("Logged in as {}", session.display_name());

        self.session.wait_for_background_refresh().await;
        match self.session.last_refresh_error() {
            Some(e) => println!("Could not load dashboard data: {}", e),
            None => self.print_counts(),
        }
        Ok(())
    }

    async fn register(&self, username: &str, email: &str) -> Result<()> {
        let username = username.trim();
        let email = email.trim();
        if username.chars().count() < MIN_USERNAME_LEN {
            bail!("Username must be at least {} characters", MIN_USERNAME_LEN);
        }
        if !email.contains('@') {
            bail!("'{}' is not a valid email address", email);
        }

        let password = rpassword::prompt_password("Password: ")?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            bail!("Password must be at least {} characters", MIN_PASSWORD_LEN);
        }
        if rpassword::prompt_password("Confirm password: ")? != password {
            bail!("Passwords do not match");
        }

        self.api.register(username, email, &password).await?;
        println!("Account created. Run `fintrack login --username {}` to sign in.", username);
        Ok(())
    }

    async fn reset_password(&self, identifier: Option<String>) -> Result<()> {
        let identifier = match identifier {
            Some(identifier) => identifier.trim().to_string(),
            None => Self::prompt_username(self.config.last_username.as_deref())?,
        };
        if identifier.is_empty() {
            bail!("Username or email required");
        }

        let new_password = rpassword::prompt_password("New password: ")?;
        if new_password.chars().count() < MIN_PASSWORD_LEN {
            bail!("Password must be at least {} characters", MIN_PASSWORD_LEN);
        }
        let confirm_password = rpassword::prompt_password("Confirm new password: ")?;
        if confirm_password != new_password {
            bail!("Passwords do not match");
        }

        self.api
            .reset_password(&identifier, &new_password, &confirm_password)
            .await?;

        // A remembered password is now wrong
        if CredentialStore::get_password(&identifier).is_some() {
            if let Err(e) = CredentialStore::delete(&identifier) {
                warn!(error = %e, "Failed to delete stale stored password");
            }
        }

        println!("Password reset. Run `fintrack login --username {}` to sign in.", identifier);
        Ok(())
    }

    async fn profile(&self) -> Result<()> {
        let token = self.require_token()?;
        let profile = self.api.fetch_profile(&token).await?;
        let user = self.session.user();

        println!("User id: {}", profile.user_id);
        if let Some(name) = user.as_ref().and_then(|u| u.username.as_deref()) {
            println!("Username: {}", name);
        }
        if let Some(message) = profile.message {
            println!("{}", message);
        }
        Ok(())
    }

    fn logout(&self, forget: bool) -> Result<()> {
        let user = self.session.user();
        self.session.logout();

        if forget {
            if let Some(username) = user.as_ref().and_then(|u| u.username.as_deref()) {
                CredentialStore::delete(username)?;
            }
        }

        match user {
            Some(user) => println!("Logged out {}", user.display_name()),
            None => println!("Not logged in"),
        }
        Ok(())
    }

    fn status(&self) -> Result<()> {
        println!("Backend: {}", self.api.base_url());

        let Some(user) = self.session.user() else {
            println!("Not logged in");
            return Ok(());
        };
        println!("Logged in as {}", user.display_name());

        match self.session.snapshot_cached_at() {
            Some(cached_at) => {
                println!(
                    "Dashboard data: updated {}{}",
                    age_display(cached_at),
                    if is_stale(cached_at) { " (stale, run `fintrack refresh`)" } else { "" }
                );
                self.print_counts();
            }
            None => println!("Dashboard data: not loaded yet"),
        }
        if let Some(theme) = self.session.theme() {
            println!("Theme: {}", theme);
        }
        Ok(())
    }

    async fn refresh(&self) -> Result<()> {
        self.require_token()?;
        self.session.refresh_dashboard_data().await?;
        self.print_counts();
        Ok(())
    }

    // ===== Dashboard =====

    async fn summary(&self, recent: usize) -> Result<()> {
        self.require_token()?;
        self.session.wait_for_background_refresh().await;
        if let Some(e) = self.session.last_refresh_error() {
            match self.session.snapshot_cached_at() {
                Some(cached_at) => println!("Warning: {} (showing data from {})", e, age_display(cached_at)),
                None => return Err(e.into()),
            }
        }

        let data = self.session.dashboard_data();

        println!("Total expenses: {}", format_amount(data.total_expenses()));

        println!("\nSpending by category:");
        let spending = data.spending_by_category();
        if spending.is_empty() {
            println!("  (no expenses)");
        }
        for entry in spending {
            println!(
                "  {:<width$} {:>12}",
                truncate(&entry.label, LABEL_WIDTH),
                format_amount(entry.total),
                width = LABEL_WIDTH
            );
        }

        println!("\nRecent expenses:");
        let transactions = data.recent_transactions(recent);
        if transactions.is_empty() {
            println!("  (none)");
        }
        for tx in transactions {
            let category = tx
                .category_id
                .and_then(|id| data.category(id))
                .map(|c| c.name.as_str())
                .unwrap_or(fintrack_core::models::UNCATEGORIZED);
            println!(
                "  #{:<5} {}  {:<desc$} {:<label$} {:>12}",
                tx.id,
                format_date(&tx.transaction_date),
                truncate(&tx.description, DESCRIPTION_WIDTH),
                truncate(category, LABEL_WIDTH),
                format_amount(tx.amount),
                desc = DESCRIPTION_WIDTH,
                label = LABEL_WIDTH
            );
        }

        println!("\nBudgets:");
        let budgets = data.sorted_budgets();
        if budgets.is_empty() {
            println!("  (none)");
        }
        for (label, budget) in budgets {
            println!(
                "  {:<width$} {} {:>12} of {:>12}  {}{}",
                truncate(&label, LABEL_WIDTH),
                usage_bar(budget.usage_ratio()),
                format_amount(budget.spent()),
                format_amount(budget.limit_amount),
                budget.period_display(),
                if budget.is_over_limit() { "  OVER" } else { "" },
                width = LABEL_WIDTH
            );
        }
        Ok(())
    }

    // ===== Mutations =====

    async fn add_expense(
        &self,
        amount: f64,
        date: Option<String>,
        description: Option<String>,
        category: Option<String>,
    ) -> Result<()> {
        let token = self.require_token()?;
        validate_amount(amount, "Amount")?;
        let date = match date {
            Some(date) => parse_date_arg(&date)?,
            None => Local::now().date_naive(),
        };

        let category_id = self.resolve_category(&token, category.as_deref().unwrap_or("")).await?;
        let tx = NewTransaction {
            category_id,
            amount,
            description: description.unwrap_or_default().trim().to_string(),
            transaction_date: date.format("%Y-%m-%d").to_string(),
        };
        let created = self.api.create_transaction(&token, &tx).await?;
        println!(
            "Added expense #{}: {} on {}",
            created.id,
            format_amount(created.amount),
            format_date(&created.transaction_date)
        );

        self.refresh_after_change().await;
        Ok(())
    }

    async fn delete_expense(&self, id: u64) -> Result<()> {
        let token = self.require_token()?;
        self.api.delete_transaction(&token, id).await?;
        println!("Deleted expense #{}", id);

        self.refresh_after_change().await;
        Ok(())
    }

    async fn add_budget(&self, category: &str, limit: f64, start: &str, end: &str) -> Result<()> {
        let token = self.require_token()?;
        validate_amount(limit, "Limit")?;
        let start = parse_date_arg(start)?;
        let end = parse_date_arg(end)?;
        validate_period(start, end)?;

        let category_id = self.resolve_category(&token, category).await?;
        let budget = NewBudget {
            category_id,
            limit_amount: limit,
            start_date: start.format("%Y-%m-%d").to_string(),
            end_date: end.format("%Y-%m-%d").to_string(),
        };
        let created = self.api.create_budget(&token, &budget).await?;
        println!(
            "Added budget #{}: {} for {}",
            created.id,
            format_amount(created.limit_amount),
            created.period_display()
        );

        self.refresh_after_change().await;
        Ok(())
    }

    // ===== Preferences =====

    fn theme(&self, name: Option<String>) -> Result<()> {
        match name {
            Some(name) => {
                let name = name.trim();
                if name.is_empty() {
                    bail!("Theme name cannot be empty");
                }
                self.session.set_theme(name)?;
                println!("Theme set to {}", name);
            }
            None => println!("{}", self.session.theme().as_deref().unwrap_or("default")),
        }
        Ok(())
    }

    // ===== Helpers =====

    fn require_token(&self) -> Result<String> {
        self.session
            .token()
            .ok_or_else(|| anyhow!("Not logged in. Run `fintrack login` first."))
    }

    /// Map a user-entered category name to an id, creating the category
    /// when it does not exist yet. "Other" and blank mean no category.
    async fn resolve_category(&self, token: &str, name: &str) -> Result<Option<u64>> {
        if is_uncategorized_name(name) {
            return Ok(None);
        }

        // Make sure the category list is current before deciding to create one
        self.session.wait_for_background_refresh().await;
        if let Some(existing) = self.session.dashboard_data().find_category(name) {
            return Ok(Some(existing.id));
        }

        let created = self
            .api
            .create_category(
                token,
                &NewCategory {
                    name: name.trim().to_string(),
                },
            )
            .await?;
        println!("Created category '{}'", created.name);
        Ok(Some(created.id))
    }

    /// The change is already saved; a failed refresh only means the cached
    /// dashboard is behind.
    async fn refresh_after_change(&self) {
        if let Err(e) = self.session.refresh_dashboard_data().await {
            println!("Warning: {}", e);
        }
    }

    fn print_counts(&self) {
        let data = self.session.dashboard_data();
        println!(
            "{} budgets, {} categories, {} transactions",
            data.budgets.len(),
            data.categories.len(),
            data.transactions.len()
        );
    }

    fn prompt_username(last_username: Option<&str>) -> Result<String> {
        match last_username {
            Some(last) => print!("Username [{}]: ", last),
            None => print!("Username: "),
        }
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim();

        match (input.is_empty(), last_username) {
            (true, Some(last)) => Ok(last.to_string()),
            _ => Ok(input.to_string()),
        }
    }

    fn confirm(prompt: &str) -> Result<bool> {
        print!("{}", prompt);
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        Ok(input.trim().to_lowercase() != "n")
    }
}

/// Text progress bar for a 0..=1 ratio, e.g. `[###-------]  30%`
fn usage_bar(ratio: f64) -> String {
    let ratio = ratio.clamp(0.0, 1.0);
    let filled = (ratio * USAGE_BAR_WIDTH as f64).round() as usize;
    format!(
        "[{}{}] {:>3}%",
        "#".repeat(filled),
        "-".repeat(USAGE_BAR_WIDTH - filled),
        (ratio * 100.0).round() as u32
    )
}

fn validate_amount(amount: f64, what: &str) -> Result<()> {
    if !amount.is_finite() || amount <= 0.0 {
        bail!("{} must be greater than zero", what);
    }
    Ok(())
}

fn validate_period(start: NaiveDate, end: NaiveDate) -> Result<()> {
    if end <= start {
        bail!("End date must be after start date");
    }
    Ok(())
}

fn parse_date_arg(input: &str) -> Result<NaiveDate> {
    parse_date(input).ok_or_else(|| anyhow!("Invalid date '{}', expected YYYY-MM-DD", input))
}
