//! Folio CLI - manage a portfolio site's projects, experiences, and metrics

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use folio_core::admin::{ExperienceForm, ExperiencesAdmin, GALLERY_SLOTS, Preapproved, ProjectsAdmin};
use folio_core::auth::{AuthContext, SESSION_KEY, Session, User};
use folio_core::backend::{Backend, SupabaseClient};
use folio_core::config::Config;
use folio_core::contact::{ContactMessage, EmailRelay};
use folio_core::intake::{IntakeFields, IntakeForm};
use folio_core::local_store::{FileStore, KeyValueStore};
use folio_core::models::{
    DateRange, Experience, ExperienceDraft, MetricEvent, Project, Rating, SortOrder, StatusFilter,
};
use folio_core::notify::{Notification, NotificationSink, Notifier, Severity};
use folio_core::resources;
use folio_core::routing::{Navigation, Route, navigate};
use folio_core::services::{ExperienceService, ImageFile, ImageStorage, MetricsService, ProjectService};
use folio_core::site;
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Parser)]
#[command(name = "folio")]
#[command(author, version, about = "Portfolio site content and metrics manager", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in to the admin panel
    Login {
        #[arg(short, long)]
        email: String,
        /// Read from stdin when omitted
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Sign out and forget the stored session
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Update the admin profile
    Profile {
        /// Name shown in the admin panel
        #[arg(long)]
        display_name: String,
    },

    /// Home page content
    Home,

    /// Manage projects
    Projects {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Manage and moderate experiences
    Experiences {
        #[command(subcommand)]
        action: ExperienceAction,
    },

    /// Published testimonials shown on the home page
    Testimonials,

    /// Dashboard metrics
    Metrics {
        /// 7d, 15d, 30d, or all
        #[arg(short, long, default_value = "all")]
        range: DateRange,
    },

    /// Record a visit or CV download (once per cooldown window)
    Track {
        #[command(subcommand)]
        action: TrackAction,
    },

    /// Send a message through the contact form
    Contact {
        #[arg(long)]
        name: String,
        /// Email or phone to reply to
        #[arg(long)]
        contact: String,
        #[arg(long)]
        service: String,
        #[arg(long)]
        message: String,
    },

    /// Resolve a site path against the route table
    Route { path: String },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ProjectAction {
    /// List projects
    List {
        #[arg(short, long, default_value = "all")]
        category: String,
        /// newest, oldest, az, or za
        #[arg(short, long, default_value = "newest")]
        sort: SortOrder,
    },
    /// Show a project detail page
    Show { slug: String },
    /// Create a project
    Create {
        #[command(flatten)]
        fields: ProjectFields,
    },
    /// Update a project
    Update {
        id: String,
        #[command(flatten)]
        fields: ProjectFields,
    },
    /// Delete a project and its images
    Delete {
        id: String,
        #[arg(long)]
        force: bool,
    },
}

#[derive(clap::Args)]
struct ProjectFields {
    #[arg(long)]
    title: Option<String>,
    /// Derived from the title when omitted
    #[arg(long)]
    slug: Option<String>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    link: Option<String>,
    /// Year (2024) or full date (2024-03-15)
    #[arg(long)]
    date: Option<String>,
    #[arg(long)]
    main_image: Option<PathBuf>,
    #[arg(long)]
    hero_image: Option<PathBuf>,
    /// Gallery tile; repeat for up to four
    #[arg(long)]
    gallery: Vec<PathBuf>,
}

#[derive(Subcommand)]
enum ExperienceAction {
    /// List experiences
    List {
        /// all, new, published, or archived
        #[arg(short, long, default_value = "all")]
        status: StatusFilter,
    },
    /// Add a published experience
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        review: String,
        #[arg(long, default_value_t = 5)]
        rating: i64,
        /// Linked project id
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        photo: Option<PathBuf>,
        /// Keep it off the home page
        #[arg(long)]
        hidden: bool,
    },
    /// Publish a new experience
    Publish { id: String },
    /// Archive a published experience
    Archive { id: String },
    /// Publish an archived experience again
    Republish { id: String },
    /// Delete an experience and its photo
    Delete {
        id: String,
        #[arg(long)]
        force: bool,
    },
    /// Submit an experience through the public form
    Submit {
        #[arg(long)]
        how_found: String,
        #[arg(long)]
        service: String,
        #[arg(long)]
        improvement: String,
        /// Required when the improvement is "Otro"
        #[arg(long)]
        improvement_other: Option<String>,
        #[arg(long)]
        name: String,
        #[arg(long)]
        review: String,
        #[arg(long, default_value_t = 5)]
        rating: i64,
        #[arg(long)]
        photo: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum TrackAction {
    /// Record a site visit
    Visit,
    /// Record a CV download
    Download,
    /// Forget the local cooldown timestamps
    Reset,
    /// Show the local cooldown timestamps
    Status,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show config file path
    Path,
}

/// Prints notifications to stderr so stdout stays parseable
struct ConsoleSink;

impl NotificationSink for ConsoleSink {
    fn notify(&self, notification: &Notification) {
        match notification.severity {
            Severity::Error => eprintln!("[!!] {}", notification.message),
            _ => eprintln!("[OK] {}", notification.message),
        }
    }
}

/// Shared handles for commands that talk to the backend
struct App {
    config: Config,
    backend: Arc<dyn Backend>,
    store: Arc<dyn KeyValueStore>,
    notifier: Notifier,
    format: OutputFormat,
    quiet: bool,
}

impl App {
    fn connect(config: Config, format: OutputFormat, quiet: bool) -> anyhow::Result<Self> {
        let client = SupabaseClient::from_config(&config.backend)?;
        debug!(url = %client.base_url(), "Connected to backend");
        let mut notifier = Notifier::new();
        if !quiet {
            notifier.add_sink(Arc::new(ConsoleSink));
        }
        Ok(Self {
            backend: Arc::new(client),
            store: Arc::new(FileStore::new(Config::state_path()?)),
            notifier,
            config,
            format,
            quiet,
        })
    }

    fn json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    fn projects(&self) -> ProjectService {
        ProjectService::new(self.backend.clone())
    }

    fn experiences(&self) -> ExperienceService {
        ExperienceService::new(self.backend.clone())
    }

    fn storage(&self) -> ImageStorage {
        ImageStorage::new(self.backend.clone(), &self.config.storage)
    }

    fn metrics(&self) -> MetricsService {
        MetricsService::new(
            self.backend.clone(),
            self.store.clone(),
            &self.config.metrics,
            &self.config.site,
        )
    }

    async fn auth(&self) -> anyhow::Result<AuthContext> {
        let auth = AuthContext::new(self.backend.clone(), self.store.clone());
        auth.init().await?;
        Ok(auth)
    }

    /// Open an admin route, failing with a sign-in hint when gated
    async fn admin(&self, route: Route) -> anyhow::Result<AuthContext> {
        let auth = self.auth().await?;
        let user = auth.current_user();
        match navigate(&route.path(), user.as_ref()) {
            Navigation::Render(_) => Ok(auth),
            Navigation::Redirect(to) => {
                debug!(from = %route, to = %to, "Admin route redirected");
                Err(folio_core::Error::NotAuthenticated.into())
            }
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: could not read .env: {}", e);
        }
    }

    // Logs go to stderr so JSON output stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("folio_core=info".parse()?)
                .add_directive("folio=info".parse()?),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        if let Some(err) = e.downcast_ref::<folio_core::Error>() {
            eprintln!("  Code: {}", err.code());
            if let Some(hint) = err.suggestion() {
                eprintln!("  Try: {}", hint);
            }
        }
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let quiet = cli.quiet;
    let format = cli.format;

    // Config, route, and contact never touch the backend
    match cli.command {
        Commands::Config { action } => cmd_config(action, quiet),
        Commands::Route { path } => cmd_route(&path, format),
        Commands::Contact {
            name,
            contact,
            service,
            message,
        } => {
            let message = ContactMessage {
                name,
                contact,
                service,
                message,
            };
            cmd_contact(message, quiet).await
        }
        command => {
            let config = Config::load()?;
            let app = App::connect(config, format, quiet)?;
            dispatch(&app, command).await
        }
    }
}

async fn dispatch(app: &App, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Login { email, password } => cmd_login(app, &email, password).await,
        Commands::Logout => cmd_logout(app).await,
        Commands::Whoami => cmd_whoami(app).await,
        Commands::Profile { display_name } => cmd_profile(app, &display_name).await,
        Commands::Home => cmd_home(app).await,
        Commands::Projects { action } => cmd_projects(app, action).await,
        Commands::Experiences { action } => cmd_experiences(app, action).await,
        Commands::Testimonials => cmd_testimonials(app).await,
        Commands::Metrics { range } => cmd_metrics(app, range).await,
        Commands::Track { action } => cmd_track(app, action).await,
        Commands::Config { .. } | Commands::Route { .. } | Commands::Contact { .. } => Ok(()),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn cmd_login(app: &App, email: &str, password: Option<String>) -> anyhow::Result<()> {
    let password = match password {
        Some(p) => p,
        None => prompt("Password: ")?,
    };
    let auth = app.auth().await?;
    let user = auth.login(email, &password).await?;
    if app.json() {
        return print_json(&user);
    }
    if !app.quiet {
        println!("Signed in as {}", user.label());
    }
    Ok(())
}

fn prompt(label: &str) -> anyhow::Result<String> {
    eprint!("{}", label);
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

async fn cmd_logout(app: &App) -> anyhow::Result<()> {
    let auth = app.auth().await?;
    auth.logout().await?;
    if !app.quiet {
        println!("Signed out.");
    }
    Ok(())
}

async fn cmd_whoami(app: &App) -> anyhow::Result<()> {
    let auth = app.auth().await?;
    let user = auth.current_user();
    if app.json() {
        return print_json(&user);
    }
    match user {
        Some(user) => {
            println!("{}", user.label());
            if let Some(email) = &user.email {
                println!("  Email: {}", email);
            }
            println!("  ID: {}", user.id);
        }
        None => println!("Not signed in."),
    }
    Ok(())
}

async fn cmd_profile(app: &App, display_name: &str) -> anyhow::Result<()> {
    let auth = app.admin(Route::AdminDashboard).await?;
    let user = auth.set_display_name(display_name).await?;
    app.notifier
        .success(format!("Profile updated: {}", user.label()));
    Ok(())
}

async fn cmd_home(app: &App) -> anyhow::Result<()> {
    let home = site::load_home(
        &app.projects(),
        &app.experiences(),
        app.config.site.home_project_limit,
    )
    .await?;
    if app.json() {
        return print_json(&home);
    }
    println!("Projects:");
    for p in &home.projects {
        print_project_line(p);
    }
    println!("\nTestimonials:");
    for e in &home.testimonials {
        print_experience_line(e);
    }
    Ok(())
}

fn print_project_line(p: &Project) {
    println!(
        "  {}  {} (/{}){}{}",
        p.id,
        p.title,
        p.slug,
        p.category
            .as_deref()
            .map(|c| format!(" [{}]", c))
            .unwrap_or_default(),
        p.display_date()
            .map(|d| format!(" {}", d))
            .unwrap_or_default()
    );
}

fn print_experience_line(e: &Experience) {
    println!(
        "  {}  {} {} [{}]{}",
        e.id,
        e.rating.stars(),
        e.name,
        e.status,
        e.project_title()
            .map(|t| format!(" on '{}'", t))
            .unwrap_or_default()
    );
}

async fn cmd_projects(app: &App, action: ProjectAction) -> anyhow::Result<()> {
    match action {
        ProjectAction::List { category, sort } => {
            let projects = site::load_catalog(&app.projects(), &category, sort).await?;
            if app.json() {
                return print_json(&projects);
            }
            if projects.is_empty() {
                if !app.quiet {
                    println!("No projects found.");
                    println!("\nCreate one with: folio projects create --title <title> --category <category>");
                }
            } else {
                if !app.quiet {
                    println!("Projects:");
                }
                for p in &projects {
                    print_project_line(p);
                }
            }
        }
        ProjectAction::Show { slug } => {
            let detail = site::load_project_detail(
                &app.projects(),
                &app.experiences(),
                &slug,
                app.config.site.related_limit,
            )
            .await?;
            if app.json() {
                return print_json(&detail);
            }
            let p = &detail.project;
            println!("Project: {}", p.title);
            println!("  ID: {}", p.id);
            println!("  Slug: {}", p.slug);
            if let Some(category) = &p.category {
                println!("  Category: {}", category);
            }
            if let Some(date) = &detail.display_date {
                println!("  Date: {}", date);
            }
            if let Some(link) = &p.link {
                println!("  Link: {}", link);
            }
            println!("  Images:");
            for url in &detail.images {
                println!("    {}", url);
            }
            if !detail.experiences.is_empty() {
                println!("  Experiences:");
                for e in &detail.experiences {
                    println!("    {} {}: {}", e.rating.stars(), e.name, e.review);
                }
            }
            if !detail.related.is_empty() {
                println!("  Related:");
                for r in &detail.related {
                    println!("    {} (/{})", r.title, r.slug);
                }
            }
        }
        ProjectAction::Create { fields } => {
            app.admin(Route::AdminProjects).await?;
            let mut admin = projects_admin(app);
            admin.refresh().await?;
            let mut form = admin.new_project();
            apply_project_fields(&mut form, fields)?;
            let project = admin.submit(form).await?;
            if app.json() {
                return print_json(&project);
            }
            if !app.quiet {
                println!("  ID: {}", project.id);
                println!("  Slug: {}", project.slug);
            }
        }
        ProjectAction::Update { id, fields } => {
            app.admin(Route::AdminProjects).await?;
            let mut admin = projects_admin(app);
            admin.refresh().await?;
            let mut form = admin.edit(&id)?;
            apply_project_fields(&mut form, fields)?;
            let project = admin.submit(form).await?;
            if app.json() {
                return print_json(&project);
            }
        }
        ProjectAction::Delete { id, force } => {
            app.admin(Route::AdminProjects).await?;
            let mut admin = projects_admin(app);
            admin.refresh().await?;
            match admin.delete(&id, &Preapproved(force)).await {
                Err(folio_core::Error::UserCancelled) => {
                    println!("Warning: This will permanently delete project '{}' and its images.", id);
                    println!("Use --force to confirm deletion.");
                }
                other => other?,
            }
        }
    }
    Ok(())
}

fn projects_admin(app: &App) -> ProjectsAdmin {
    ProjectsAdmin::new(app.projects(), app.storage(), app.notifier.clone(), &app.config)
}

fn apply_project_fields(
    form: &mut folio_core::admin::ProjectForm,
    fields: ProjectFields,
) -> anyhow::Result<()> {
    if fields.gallery.len() > GALLERY_SLOTS {
        anyhow::bail!("At most {} gallery images are allowed", GALLERY_SLOTS);
    }
    if let Some(title) = fields.title {
        // Editing keeps the stored slug unless one is given
        if form.slug.is_empty() {
            form.set_title(title);
        } else {
            form.title = title;
        }
    }
    if let Some(slug) = fields.slug {
        form.slug = slug;
    }
    if fields.category.is_some() {
        form.category = fields.category;
    }
    if fields.description.is_some() {
        form.description = fields.description;
    }
    if fields.link.is_some() {
        form.link = fields.link;
    }
    if fields.date.is_some() {
        form.project_date = fields.date;
    }
    if let Some(path) = fields.main_image {
        form.main_image = Some(ImageFile::from_path(&path)?);
    }
    if let Some(path) = fields.hero_image {
        form.hero_image = Some(ImageFile::from_path(&path)?);
    }
    for (slot, path) in fields.gallery.iter().enumerate() {
        form.gallery[slot] = Some(ImageFile::from_path(path)?);
    }
    Ok(())
}

async fn cmd_experiences(app: &App, action: ExperienceAction) -> anyhow::Result<()> {
    if let ExperienceAction::Submit {
        how_found,
        service,
        improvement,
        improvement_other,
        name,
        review,
        rating,
        photo,
    } = action
    {
        let mut form = IntakeForm::new(app.experiences(), app.storage(), &app.config);
        *form.fields_mut() = IntakeFields {
            how_found,
            service_acquired: service,
            improvement_aspect: improvement,
            improvement_other: improvement_other.unwrap_or_default(),
            name,
            review,
            rating,
        };
        if let Some(path) = photo {
            form.attach_photo(ImageFile::from_path(&path)?)?;
        }
        let experience = form.submit().await?;
        if app.json() {
            return print_json(&experience);
        }
        if !app.quiet {
            println!("Thank you! Your experience was sent and will appear once reviewed.");
        }
        return Ok(());
    }

    app.admin(Route::AdminExperiences).await?;
    let mut admin = ExperiencesAdmin::new(
        app.experiences(),
        app.projects(),
        app.storage(),
        app.notifier.clone(),
        &app.config,
    );

    match action {
        ExperienceAction::List { status } => {
            admin.set_filter(status).await?;
            let items = admin.workflow().items();
            if app.json() {
                return print_json(&items);
            }
            if items.is_empty() {
                if !app.quiet {
                    println!("No experiences found.");
                }
            } else {
                for e in items {
                    print_experience_line(e);
                }
            }
        }
        ExperienceAction::Create {
            name,
            review,
            rating,
            project,
            photo,
            hidden,
        } => {
            admin.refresh().await?;
            let mut form: ExperienceForm = admin.new_experience();
            form.draft = ExperienceDraft {
                name,
                review,
                rating: Rating::new(rating)?,
                project_id: project,
                show_on_home: !hidden,
                ..form.draft
            };
            if let Some(path) = photo {
                form.photo = Some(ImageFile::from_path(&path)?);
            }
            let experience = admin.submit(form).await?;
            if app.json() {
                return print_json(&experience);
            }
            if !app.quiet {
                println!("  ID: {}", experience.id);
            }
        }
        ExperienceAction::Publish { id } => {
            admin.refresh().await?;
            let e = admin.publish(&id).await?;
            if app.json() {
                return print_json(&e);
            }
        }
        ExperienceAction::Archive { id } => {
            admin.refresh().await?;
            let e = admin.archive(&id).await?;
            if app.json() {
                return print_json(&e);
            }
        }
        ExperienceAction::Republish { id } => {
            admin.refresh().await?;
            let e = admin.republish(&id).await?;
            if app.json() {
                return print_json(&e);
            }
        }
        ExperienceAction::Delete { id, force } => {
            admin.refresh().await?;
            match admin.delete(&id, &Preapproved(force)).await {
                Err(folio_core::Error::UserCancelled) => {
                    println!("Warning: This will permanently delete experience '{}'.", id);
                    println!("Use --force to confirm deletion.");
                }
                other => other?,
            }
        }
        ExperienceAction::Submit { .. } => {}
    }
    Ok(())
}

async fn cmd_testimonials(app: &App) -> anyhow::Result<()> {
    let resource = resources::testimonials(app.experiences());
    let loaded = resource.fetch(()).await;
    if let Some(error) = loaded.error {
        anyhow::bail!("Could not load testimonials: {}", error);
    }
    let testimonials = loaded.data.unwrap_or_default();
    if app.json() {
        return print_json(&testimonials);
    }
    if testimonials.is_empty() && !app.quiet {
        println!("No published testimonials yet.");
    }
    for e in &testimonials {
        println!("{} {}", e.rating.stars(), e.name);
        println!("  {}", e.review);
    }
    Ok(())
}

async fn cmd_metrics(app: &App, range: DateRange) -> anyhow::Result<()> {
    app.admin(Route::AdminDashboard).await?;
    let resource = resources::metrics(app.metrics());
    let loaded = resource.fetch(range).await;
    if let Some(error) = loaded.error {
        anyhow::bail!("Could not load metrics: {}", error);
    }
    let Some(snapshot) = loaded.data else {
        anyhow::bail!("Metrics were not loaded");
    };
    if app.json() {
        return print_json(&snapshot);
    }
    println!("Metrics ({})", snapshot.range);
    if let Some(cutoff) = snapshot.cutoff {
        println!("  Since: {}", cutoff.format("%Y-%m-%d %H:%M"));
    }
    println!("  Visits: {}", snapshot.visits);
    println!("  CV downloads: {}", snapshot.downloads);
    println!("  Projects: {}", snapshot.total_projects);
    println!("  Published experiences: {}", snapshot.published_experiences);
    if !snapshot.latest_new.is_empty() {
        println!("  Awaiting review:");
        for e in &snapshot.latest_new {
            print_experience_line(e);
        }
    }
    Ok(())
}

async fn cmd_track(app: &App, action: TrackAction) -> anyhow::Result<()> {
    let metrics = app.metrics();
    let event = match action {
        TrackAction::Visit => MetricEvent::Visit,
        TrackAction::Download => MetricEvent::Download,
        TrackAction::Reset => {
            metrics.reset_tracking()?;
            if !app.quiet {
                println!("Tracking timestamps cleared.");
            }
            return Ok(());
        }
        TrackAction::Status => {
            let mut status = serde_json::Map::new();
            for event in MetricEvent::all() {
                let last = metrics.last_tracked(event)?;
                status.insert(event.storage_key().to_string(), serde_json::json!(last));
                if !app.json() {
                    match last {
                        Some(at) => println!("{}: {}", event, at.format("%Y-%m-%d %H:%M:%S")),
                        None => println!("{}: never", event),
                    }
                }
            }
            if app.json() {
                return print_json(&status);
            }
            return Ok(());
        }
    };

    let outcome = metrics.track(event).await?;
    if app.json() {
        return print_json(&outcome);
    }
    if !app.quiet {
        match outcome {
            folio_core::models::TrackOutcome::Recorded { at } => {
                println!("Recorded {} at {}", event, at.format("%Y-%m-%d %H:%M:%S"))
            }
            folio_core::models::TrackOutcome::Skipped { next_allowed, .. } => println!(
                "Already recorded; next {} counts after {}",
                event,
                next_allowed.format("%Y-%m-%d %H:%M:%S")
            ),
        }
    }
    Ok(())
}

async fn cmd_contact(message: ContactMessage, quiet: bool) -> anyhow::Result<()> {
    let config = Config::load()?;
    let mut notifier = Notifier::new();
    if !quiet {
        notifier.add_sink(Arc::new(ConsoleSink));
    }
    let relay = EmailRelay::new(&config.contact, notifier)?;
    relay.send(&message).await?;
    Ok(())
}

/// Signed-in user from the stored session, without contacting the backend
fn stored_user() -> anyhow::Result<Option<User>> {
    let store = FileStore::new(Config::state_path()?);
    let Some(raw) = store.get(SESSION_KEY)? else {
        return Ok(None);
    };
    match serde_json::from_str::<Session>(&raw) {
        Ok(session) if !session.is_expired_at(chrono::Utc::now()) => Ok(Some(session.user)),
        Ok(_) => Ok(None),
        Err(e) => {
            warn!(error = %e, "Ignoring unreadable stored session");
            Ok(None)
        }
    }
}

fn cmd_route(path: &str, format: OutputFormat) -> anyhow::Result<()> {
    let user = stored_user()?;
    let navigation = navigate(path, user.as_ref());
    if format == OutputFormat::Json {
        return print_json(&navigation);
    }
    match navigation {
        Navigation::Render(route) => println!("render {}", route),
        Navigation::Redirect(route) => println!("redirect {}", route),
    }
    Ok(())
}

fn cmd_config(action: ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            for (key, value) in config.list()? {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            println!("{}", Config::config_path()?.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["folio", "metrics", "--range", "7d", "--format", "json"])
            .unwrap();
        assert!(cli.format == OutputFormat::Json);
        assert!(matches!(
            cli.command,
            Commands::Metrics {
                range: DateRange::Last7Days
            }
        ));
    }

    #[test]
    fn test_rejects_unknown_status_filter() {
        let result = Cli::try_parse_from(["folio", "experiences", "list", "--status", "pending"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_gallery_is_repeatable() {
        let cli = Cli::try_parse_from([
            "folio", "projects", "create", "--title", "Logo", "--gallery", "a.png", "--gallery",
            "b.png",
        ])
        .unwrap();
        match cli.command {
            Commands::Projects {
                action: ProjectAction::Create { fields },
            } => assert_eq!(fields.gallery.len(), 2),
            _ => panic!("expected projects create"),
        }
    }

    #[test]
    fn test_too_many_gallery_images() {
        let mut form = folio_core::admin::ProjectForm::default();
        let fields = ProjectFields {
            title: None,
            slug: None,
            category: None,
            description: None,
            link: None,
            date: None,
            main_image: None,
            hero_image: None,
            gallery: vec![PathBuf::from("x.png"); GALLERY_SLOTS + 1],
        };
        assert!(apply_project_fields(&mut form, fields).is_err());
    }

    #[test]
    fn test_title_derives_slug_for_new_projects() {
        let mut form = folio_core::admin::ProjectForm::default();
        let fields = ProjectFields {
            title: Some("Mi Portafolio".to_string()),
            slug: None,
            category: Some("Desarrollo Web".to_string()),
            description: None,
            link: None,
            date: Some("2023".to_string()),
            main_image: None,
            hero_image: None,
            gallery: Vec::new(),
        };
        apply_project_fields(&mut form, fields).unwrap();
        assert_eq!(form.slug, "mi-portafolio");
        assert_eq!(form.project_date.as_deref(), Some("2023"));
    }
}
