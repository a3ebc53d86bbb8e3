use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use tracing::error;

use trafficfill::args::{AuthArgs, BrowseArgs, Command, EnrichArgs, ExtractArgs};
use trafficfill::browse::{self, BrowseRequest};
use trafficfill::config::{self, AppConfig, DatabaseConfig};
use trafficfill::enrich::ColumnMapping;
use trafficfill::store::{DataStore, SqliteStore};
use trafficfill::upload::{self, UploadRequest};
use trafficfill::users::{NewUser, Session, UserStore};
use trafficfill::{csv_io, file_format, utils, Args};

fn login(database: &DatabaseConfig, auth: &AuthArgs) -> Result<Session> {
    let users = UserStore::open(&database.path, &database.users_table)
        .context("Failed to open the users table")?;
    users
        .login(&auth.user, &auth.password)
        .context("Incorrect username or password")
}

fn open_store(database: &DatabaseConfig) -> Result<SqliteStore> {
    SqliteStore::open(&database.path, &database.table)
        .with_context(|| format!("Failed to open traffic database {:?}", database.path))
}

fn run_extract(args: &ExtractArgs, config: &AppConfig) -> Result<()> {
    let mut table = file_format::read_table_file(&args.input)?;
    let url_column = upload::pick_url_column(&table, args.url_column.as_deref())?;
    let summary = upload::extract_targets(&mut table, &url_column, &config.database.key_column)?;

    println!("\n--- Domains in {:?} ({}) ---", args.input, url_column);
    upload::print_extraction_summary(&summary, args.show);

    if let Some(output) = &args.output {
        file_format::write_table_file(&table, output)?;
        println!("\nWrote {:?}", output);
    }
    Ok(())
}

fn run_columns(auth: &AuthArgs, config: &AppConfig) -> Result<()> {
    let session = login(&config.database, auth)?;
    let store = open_store(&config.database)?;

    println!("Columns available in {}:", store.table());
    for column in store.columns()? {
        if column != config.database.key_column {
            println!("- {}", column);
        }
    }

    session.logout();
    Ok(())
}

fn run_browse(args: &BrowseArgs, config: &AppConfig) -> Result<()> {
    utils::validate_browse_args(args)?;
    let session = login(&config.database, &args.auth)?;
    let store = open_store(&config.database)?;

    let columns = if args.all_columns {
        Vec::new()
    } else if !args.columns.is_empty() {
        args.columns.clone()
    } else {
        browse::default_columns(&store.columns()?, &config.browse.default_columns)
    };

    let request = BrowseRequest {
        date: args.date.as_deref().map(utils::parse_date).transpose()?,
        targets_filter: args.filter.clone(),
        columns,
    };
    let table = browse::browse(
        &session,
        &store,
        &config.database.key_column,
        &config.database.date_column,
        &request,
    )?;

    if table.is_empty() {
        println!("No data found for the selected filters.");
    } else {
        let shown = match args.limit {
            Some(limit) => table.head(limit),
            None => table,
        };
        match &args.output {
            Some(path) => {
                file_format::write_table_file(&shown, path)?;
                println!("Wrote {} rows to {:?}", utils::format_number(shown.len()), path);
            }
            None => csv_io::write_csv(&shown, std::io::stdout().lock())?,
        }
    }

    session.logout();
    Ok(())
}

fn run_enrich(args: &EnrichArgs, config: &AppConfig) -> Result<()> {
    utils::validate_enrich_args(args)?;
    let session = login(&config.database, &args.auth)?;
    let store = open_store(&config.database)?;

    let date = match &args.date {
        Some(raw) => utils::parse_date(raw)?,
        None => Local::now().date_naive(),
    };
    let attributes = if args.columns.is_empty() {
        config.upload.default_attributes.clone()
    } else {
        args.columns.clone()
    };
    let mapping = args
        .mappings
        .iter()
        .map(|raw| ColumnMapping::parse_entry(raw))
        .collect::<trafficfill::Result<ColumnMapping>>()?;

    let request = UploadRequest {
        input: args.input.clone(),
        url_column: args.url_column.clone(),
        date,
        attributes,
        mapping,
    };
    let result = upload::run_upload(&session, &store, &config.database, &request)
        .context("Failed to enrich the uploaded file")?;

    file_format::write_table_file(&result.merged, &args.output)?;
    upload::print_upload_results(&result, date);
    println!("Wrote {:?}", args.output);

    session.logout();
    Ok(())
}

fn run(args: &Args) -> Result<()> {
    if let Command::InitConfig = args.command {
        let path = config::init_default_config()?;
        println!("Created {} with default settings", path.display());
        return Ok(());
    }

    let config = config::load_config(args.config.as_deref())?;

    match &args.command {
        Command::InitConfig => Ok(()),
        Command::Register(register) => {
            let users = UserStore::open(&config.database.path, &config.database.users_table)?;
            users.create_user(&NewUser {
                username: &register.user,
                email: &register.email,
                password: &register.password,
                secret_question: &register.secret_question,
                secret_answer: &register.secret_answer,
            })?;
            println!("User '{}' registered", register.user);
            Ok(())
        }
        Command::ResetPassword(reset) => {
            let users = UserStore::open(&config.database.path, &config.database.users_table)?;
            users
                .reset_password(
                    &reset.user,
                    &reset.secret_question,
                    &reset.secret_answer,
                    &reset.new_password,
                )
                .context("The information provided is incorrect")?;
            println!("Password updated for '{}'", reset.user);
            Ok(())
        }
        Command::Extract(extract) => run_extract(extract, &config),
        Command::Columns(auth) => run_columns(auth, &config),
        Command::Browse(browse) => run_browse(browse, &config),
        Command::Enrich(enrich) => run_enrich(enrich, &config),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    utils::setup_logging(args.verbose);

    match run(&args) {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
