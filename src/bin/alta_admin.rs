//! Administrative command line for Alta Colaboradores.
//!
//! Usage: `cargo run --bin alta-admin -- <command>`
//!
//! Reads the same configuration as the server (`ALTA_CONFIG` or `config.yml`).

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use alta_colaboradores::{
    config::Config,
    db::{
        self,
        repositories::{SqlxSesionRepository, SqlxUsuarioRepository},
    },
    models::{NuevoUsuario, Rol},
    services::UsuarioService,
};

/// Environment variable read when `--password` is omitted
const PASSWORD_ENV: &str = "ALTA_ADMIN_PASSWORD";

#[derive(Parser, Debug)]
#[command(
    name = "alta-admin",
    about = "Maintenance tasks for the Alta Colaboradores database",
    version
)]
struct Cli {
    /// Configuration file (defaults to ALTA_CONFIG or config.yml)
    #[arg(long, global = true)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending database migrations
    Migrar,
    /// Create a usuario
    CrearUsuario(CrearUsuarioArgs),
    /// Replace the password of a usuario and close their sessions
    ResetPassword(ResetPasswordArgs),
    /// Deactivate a usuario and close their sessions
    Desactivar {
        /// Correo of the usuario
        correo: String,
    },
    /// List usuarios whose password hash must be reset
    AuditarHashes,
    /// Delete expired sessions
    LimpiarSesiones,
}

#[derive(Args, Debug)]
struct CrearUsuarioArgs {
    correo: String,
    #[arg(long)]
    nombre: String,
    /// admin, coordinador or consulta
    #[arg(long, default_value = "consulta")]
    rol: Rol,
    #[arg(long)]
    area_id: Option<i64>,
    #[arg(long)]
    password: Option<String>,
}

#[derive(Args, Debug)]
struct ResetPasswordArgs {
    correo: String,
    #[arg(long)]
    password: Option<String>,
}

fn password(arg: Option<String>) -> Result<String> {
    match arg.or_else(|| std::env::var(PASSWORD_ENV).ok()) {
        Some(p) if !p.is_empty() => Ok(p),
        _ => bail!("Password required: pass --password or set {}", PASSWORD_ENV),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "alta_colaboradores=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(Config::default_path);
    let config = Config::load_with_env(&config_path)?;
    let pool = db::create_pool(&config.database).await?;

    if let Command::Migrar = cli.command {
        let applied = db::migrations::run_migrations(&pool).await?;
        println!("{} migration(s) applied", applied);
        return Ok(());
    }

    if !db::migrations::is_up_to_date(&pool).await? {
        bail!("Database has pending migrations, run `alta-admin migrar` first");
    }

    let usuarios = UsuarioService::with_session_expiration(
        SqlxUsuarioRepository::boxed(pool.clone()),
        SqlxSesionRepository::boxed(pool),
        config.auth.session_expiration_days,
    );

    match cli.command {
        Command::Migrar => {}
        Command::CrearUsuario(args) => {
            let usuario = usuarios
                .crear_usuario(NuevoUsuario {
                    correo: args.correo,
                    nombre: args.nombre,
                    password: password(args.password)?,
                    rol: args.rol,
                    area_id: args.area_id,
                })
                .await?;
            println!("Usuario {} created ({}, id {})", usuario.correo, usuario.rol, usuario.id);
        }
        Command::ResetPassword(args) => {
            let usuario = usuarios
                .get_by_correo(&args.correo)
                .await?
                .with_context(|| format!("Usuario {} not found", args.correo))?;
            usuarios
                .restablecer_password(usuario.id, &password(args.password)?)
                .await?;
            println!("Password reset for {}", usuario.correo);
        }
        Command::Desactivar { correo } => {
            let usuario = usuarios
                .get_by_correo(&correo)
                .await?
                .with_context(|| format!("Usuario {} not found", correo))?;
            let cerradas = usuarios.desactivar(usuario.id).await?;
            println!("{} deactivated, {} session(s) closed", usuario.correo, cerradas);
        }
        Command::AuditarHashes => {
            let pendientes = usuarios.auditar_hashes().await?;
            if pendientes.is_empty() {
                println!("All password hashes are argon2");
            }
            for p in &pendientes {
                println!(
                    "{:>6}  {:<40} {:<12} {}",
                    p.id,
                    p.correo,
                    p.tipo,
                    if p.activo { "activo" } else { "inactivo" }
                );
            }
        }
        Command::LimpiarSesiones => {
            let n = usuarios.limpiar_sesiones().await?;
            println!("{} expired session(s) removed", n);
        }
    }

    Ok(())
}
