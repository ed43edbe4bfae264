//! Command handlers, one per screen of the seller app.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use shopsyra_core::auth::otp::normalize_mobile;
use shopsyra_core::auth::KeyValueStore;
use shopsyra_core::models::product::{owned_by, CATEGORIES, SIZE_OPTIONS};
use shopsyra_core::models::{format_inr, NewProduct, NewSeller, ProductSummary, Seller, Variant};
use shopsyra_core::navigation::Route;
use shopsyra_core::{ApiClient, ApiError, Config, NavigationGate, SessionManager};

pub type Sessions = SessionManager<Box<dyn KeyValueStore>, ApiClient>;

/// Fields collected by the add-product command
pub struct ProductForm {
    pub name: String,
    pub description: String,
    pub category: String,
    pub price: f64,
    pub stock: i64,
    pub size: Option<String>,
    pub images: Vec<PathBuf>,
}

pub struct Client {
    pub api: ApiClient,
    pub session: Sessions,
    pub gate: NavigationGate,
    pub config: Config,
}

/// Tell the user why the requested screen was not shown.
pub fn report_redirect(requested: Route, redirect: Route) {
    match redirect {
        Route::SignIn => {
            eprintln!("{} needs a signed-in seller.", requested.title());
            eprintln!("Run `shopsyra signin --mobile <number>` first.");
        }
        _ => {
            eprintln!("Already signed in; {} is not available.", requested.title());
            eprintln!("Run `shopsyra logout` to switch accounts.");
        }
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

impl Client {
    /// Re-run the gate after the session changed and report where it lands
    fn follow_gate(&mut self) {
        if let Some(route) = self.gate.evaluate(&self.session.session()) {
            println!("→ {}", route.title());
        }
    }

    /// Seller profile from the local cache, fetching and caching it if absent
    async fn current_seller(&self) -> Result<Seller> {
        if let Some(seller) = self.session.cached_seller()? {
            return Ok(seller);
        }
        let seller = self
            .api
            .fetch_me()
            .await?
            .context("Server returned no seller profile")?;
        if let Err(e) = self.session.cache_seller(&seller) {
            warn!(error = %e, "Failed to cache seller profile");
        }
        Ok(seller)
    }

    pub fn status(&self) -> Result<()> {
        let cached = self.session.cached_seller().unwrap_or_default();
        match cached {
            Some(seller) => println!("Signed in as {} ({})", seller.name, seller.mobile),
            None => println!("Signed in"),
        }
        println!("API: {}", self.api.base_url());
        Ok(())
    }

    pub async fn sign_in(&mut self, mobile: Option<String>, otp: Option<String>) -> Result<()> {
        let mobile = match mobile.or_else(|| self.config.last_mobile.clone()) {
            Some(m) => m,
            None => prompt("Mobile number")?,
        };
        let mobile = normalize_mobile(&mobile)?;

        let sent = self.api.send_otp(&mobile).await?;
        if !sent.success {
            bail!(sent.message.unwrap_or_else(|| "Failed to send OTP".to_string()));
        }
        println!("OTP sent to {}", mobile);

        let otp = match otp {
            Some(otp) => otp,
            None => prompt("OTP")?,
        };
        let verification = self.api.verify_otp(&mobile, &otp).await?;
        if !verification.success {
            bail!("Invalid OTP. Please try again.");
        }

        let Some(seller) = self.api.find_seller(&mobile).await? else {
            println!("No seller account found with this mobile number.");
            println!("Create one with `shopsyra signup --mobile <number> --name <name>`.");
            return Ok(());
        };

        let token = verification
            .token
            .filter(|t| !t.is_empty())
            .context("Server did not issue a session token")?;
        self.session.set_session(&token)?;
        self.session.cache_seller(&seller)?;

        self.config.last_mobile = Some(mobile);
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }

        info!("Sign-in complete");
        println!("Welcome, {}!", seller.name);
        self.follow_gate();
        Ok(())
    }

    pub async fn sign_up(
        &self,
        mobile: &str,
        name: &str,
        email: Option<&str>,
        address: Option<&str>,
    ) -> Result<()> {
        let seller = NewSeller::new(mobile, name, email, address);
        seller.validate()?;
        self.api
            .create_seller(&seller)
            .await
            .context("Error in signing up. Please try again.")?;

        println!("Seller account created for {}.", seller.name);
        println!("Sign in with `shopsyra signin --mobile {}`.", seller.mobile);
        Ok(())
    }

    pub async fn products(&self, json: bool) -> Result<()> {
        let seller = self.current_seller().await?;
        let all = self.api.fetch_products().await?;
        let mine: Vec<_> = owned_by(&all, &seller.id).into_iter().cloned().collect();

        if json {
            println!("{}", serde_json::to_string_pretty(&mine)?);
            return Ok(());
        }

        if mine.is_empty() {
            println!("No products yet. Add one with `shopsyra add-product`.");
        }
        for p in &mine {
            println!(
                "{:<32} {:>12}  stock {:>5}  sold {:>5}",
                p.name,
                format_inr(p.price),
                p.stock,
                p.sold_count
            );
        }

        let summary = ProductSummary::from_products(&mine);
        println!();
        println!("Products: {}", summary.total_products);
        println!("In stock: {}", summary.total_stock);
        println!("Sold:     {}", summary.total_sold);
        println!("Revenue:  {}", format_inr(summary.revenue));
        Ok(())
    }

    pub async fn profile(&self, json: bool) -> Result<()> {
        let seller = match self.api.fetch_me().await {
            Ok(Some(seller)) => seller,
            Ok(None) => self.current_seller().await?,
            Err(e) if e.downcast_ref::<ApiError>().is_some_and(ApiError::is_auth_failure) => return Err(e),
            Err(e) => {
                warn!(error = %e, "Error loading seller data, using cached profile");
                self.current_seller().await?
            }
        };

        if json {
            println!("{}", serde_json::to_string_pretty(&seller)?);
            return Ok(());
        }

        println!("[{}] {}", seller.initials(), seller.name);
        println!("Mobile:   {}", seller.mobile);
        if let Some(ref email) = seller.email {
            println!("Email:    {}", email);
        }
        if let Some(ref shop) = seller.shop_name {
            println!("Shop:     {}", shop);
        }
        if let Some(addr) = seller.shop_address.as_ref().or(seller.address.as_ref()) {
            println!("Address:  {}", addr);
        }
        if let Some(ref gst) = seller.gst_number {
            println!("GST:      {}", gst);
        }
        println!("Status:   {}", seller.status_display());
        if let Some(since) = seller.member_since() {
            println!("Member since {}", since);
        }
        Ok(())
    }

    pub async fn add_product(&self, form: ProductForm) -> Result<()> {
        if !CATEGORIES.contains(&form.category.as_str()) {
            bail!("Unknown category '{}'. Choose one of: {}", form.category, CATEGORIES.join(", "));
        }
        if let Some(ref size) = form.size {
            if !SIZE_OPTIONS.contains(&size.as_str()) {
                bail!("Unknown size '{}'. Choose one of: {}", size, SIZE_OPTIONS.join(", "));
            }
        }

        let seller = self
            .session
            .cached_seller()?
            .context("Missing seller - please sign in again")?;

        let mut images = Vec::with_capacity(form.images.len());
        for path in &form.images {
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read image {}", path.display()))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "image.jpg".to_string());
            images.push((name, bytes));
        }
        let img_urls = if images.is_empty() {
            Vec::new()
        } else {
            println!("Uploading {} image(s)...", images.len());
            self.api.upload_images(images).await.context("Upload failed")?
        };

        let product = NewProduct {
            seller: seller.id,
            name: form.name.trim().to_string(),
            description: form.description.trim().to_string(),
            category: form.category,
            price: form.price,
            stock: form.stock,
            variants: vec![Variant {
                size: form.size.unwrap_or_default(),
                stock: form.stock,
            }],
            img_urls,
        };
        self.api.create_product(&product).await?;
        println!("Product added successfully");
        Ok(())
    }

    /// Drop a session the server no longer accepts
    pub fn logout_expired(&mut self) -> Result<()> {
        self.session
            .logout()
            .context("Failed to clear the expired session")?;
        eprintln!("Your session has expired. Run `shopsyra signin` to sign in again.");
        self.follow_gate();
        Ok(())
    }

    pub fn logout(&mut self) -> Result<()> {
        self.session
            .logout()
            .context("Failed to sign out. Please try again.")?;
        println!("Signed out");
        self.follow_gate();
        Ok(())
    }
}
