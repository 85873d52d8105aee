use std::env;
use std::io::{self, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand};
use instantart_contracts::chat::{parse_intent, Intent, CHAT_HELP_COMMANDS};
use instantart_contracts::events::EventWriter;
use instantart_contracts::gallery::{FileHistoryRepository, GalleryStore, GeneratedImage};
use instantart_contracts::prompt::AppMode;
use instantart_engine::config::load_dotenv;
use instantart_engine::gateway::DryrunGateway;
use instantart_engine::{
    build_gateway, handle_relay_request, new_session_id, GatewayConfig, GatewayKind,
    GenerationGateway, Secret, SourceImage, Studio,
};
use serde_json::{json, Value};

#[derive(Debug, Parser)]
#[command(
    name = "instantart",
    version,
    about = "Prompt-templated image generation with a local gallery"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Parser)]
struct GlobalArgs {
    /// Gallery directory (defaults to $INSTANTART_HOME or ./.instantart)
    #[arg(long, global = true)]
    gallery: Option<PathBuf>,
    /// Event log path (defaults to <gallery>/events.jsonl)
    #[arg(long, global = true)]
    events: Option<PathBuf>,
    #[arg(long, global = true)]
    no_events: bool,
    /// gemini, relay or dryrun
    #[arg(long, global = true, default_value = "gemini")]
    gateway: String,
    #[arg(long, global = true)]
    model: Option<String>,
    #[arg(long, global = true)]
    api_key: Option<String>,
    #[arg(long, global = true)]
    relay_url: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate an image from a templated prompt
    Generate(GenerateArgs),
    /// Edit a source image with a raw instruction
    Edit(EditArgs),
    /// Print the text that would be sent, without calling the gateway
    Prompt(PromptArgs),
    /// List the gallery, newest first
    History,
    /// Show one gallery entry
    Show(ShowArgs),
    /// Write a gallery image to disk
    Export(ExportArgs),
    /// Remove every gallery entry
    Clear(ClearArgs),
    Styles,
    Ratios,
    /// Interactive session
    Chat,
    /// Answer one relay request read from stdin
    Relay,
}

#[derive(Debug, Parser)]
struct ConfigArgs {
    #[arg(long)]
    style: Option<String>,
    #[arg(long)]
    ratio: Option<String>,
    #[arg(long)]
    camera: Option<String>,
    #[arg(long)]
    lighting: Option<String>,
    #[arg(long)]
    mood: Option<String>,
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    prompt: String,
    #[command(flatten)]
    config: ConfigArgs,
    /// Also write the image to this file or directory
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct EditArgs {
    #[arg(long)]
    image: PathBuf,
    instruction: String,
    #[command(flatten)]
    config: ConfigArgs,
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct PromptArgs {
    text: String,
    #[arg(long, default_value = "generate")]
    mode: String,
    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Debug, Parser)]
struct ShowArgs {
    id: String,
}

#[derive(Debug, Parser)]
struct ExportArgs {
    /// Defaults to the newest entry
    id: Option<String>,
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct ClearArgs {
    #[arg(long)]
    yes: bool,
}

const PROMPT_PREVIEW_CHARS: usize = 72;

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("instantart error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Generate(args) => run_generate(&cli.global, args),
        Command::Edit(args) => run_edit(&cli.global, args),
        Command::Prompt(args) => run_prompt(&cli.global, args),
        Command::History => run_history(&cli.global),
        Command::Show(args) => run_show(&cli.global, args),
        Command::Export(args) => run_export(&cli.global, args),
        Command::Clear(args) => run_clear(&cli.global, args),
        Command::Styles => {
            let studio = open_studio(&cli.global, Access::Browse)?;
            print_styles(&studio);
            Ok(0)
        }
        Command::Ratios => {
            let studio = open_studio(&cli.global, Access::Browse)?;
            print_ratios(&studio);
            Ok(0)
        }
        Command::Chat => {
            run_chat(&cli.global)?;
            Ok(0)
        }
        Command::Relay => run_relay(&cli.global),
    }
}

fn gateway_config(global: &GlobalArgs) -> GatewayConfig {
    let dotenv = load_dotenv(Path::new(".env"));
    let mut config = GatewayConfig::from_env(&dotenv);
    if let Some(key) = non_empty(global.api_key.as_deref()) {
        config.api_key = Some(Secret::new(key));
    }
    if let Some(model) = non_empty(global.model.as_deref()) {
        config.model = model;
    }
    if let Some(url) = non_empty(global.relay_url.as_deref()) {
        config.relay_url = Some(url);
    }
    config
}

fn gallery_dir(global: &GlobalArgs) -> PathBuf {
    global
        .gallery
        .clone()
        .or_else(|| {
            env::var("INSTANTART_HOME")
                .ok()
                .filter(|value| !value.trim().is_empty())
                .map(PathBuf::from)
        })
        .unwrap_or_else(|| PathBuf::from(".instantart"))
}

/// Whether a command can reach the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Submit,
    Browse,
}

fn open_studio(global: &GlobalArgs, access: Access) -> Result<Studio> {
    let kind: GatewayKind = global.gateway.parse()?;
    let gateway: Box<dyn GenerationGateway> = match access {
        Access::Submit => build_gateway(kind, &gateway_config(global))?,
        Access::Browse => Box::new(DryrunGateway),
    };
    let dir = gallery_dir(global);
    let session_id = new_session_id();
    let events = if global.no_events {
        EventWriter::disabled(session_id)
    } else {
        let path = global
            .events
            .clone()
            .unwrap_or_else(|| dir.join("events.jsonl"));
        EventWriter::new(path, session_id)
    };
    let studio = Studio::open(
        GalleryStore::new(FileHistoryRepository::in_dir(&dir)),
        gateway,
        events,
    );
    for warning in studio.warnings() {
        eprintln!("instantart: warning: {warning}");
    }
    Ok(studio)
}

fn apply_config(studio: &mut Studio, args: &ConfigArgs) {
    if let Some(style) = args.style.as_deref() {
        if let Some(reason) = studio.set_style(style) {
            eprintln!("instantart: warning: {reason}");
        }
    }
    if let Some(ratio) = args.ratio.as_deref() {
        if let Some(reason) = studio.set_aspect_ratio(ratio) {
            eprintln!("instantart: warning: {reason}");
        }
    }
    if let Some(camera) = args.camera.as_deref() {
        studio.set_camera(camera);
    }
    if let Some(lighting) = args.lighting.as_deref() {
        studio.set_lighting(lighting);
    }
    if let Some(mood) = args.mood.as_deref() {
        studio.set_mood(mood);
    }
}

fn run_generate(global: &GlobalArgs, args: GenerateArgs) -> Result<i32> {
    let mut studio = open_studio(global, Access::Submit)?;
    apply_config(&mut studio, &args.config);
    studio.set_mode(AppMode::Generate);
    let seen = studio.warnings().len();
    let item = studio.submit(&args.prompt)?;
    report_created(&studio, &item, args.out.as_deref(), seen)?;
    Ok(0)
}

fn run_edit(global: &GlobalArgs, args: EditArgs) -> Result<i32> {
    let mut studio = open_studio(global, Access::Submit)?;
    apply_config(&mut studio, &args.config);
    studio.set_source_image(SourceImage::from_path(&args.image)?);
    let seen = studio.warnings().len();
    let item = studio.submit(&args.instruction)?;
    report_created(&studio, &item, args.out.as_deref(), seen)?;
    Ok(0)
}

fn report_created(
    studio: &Studio,
    item: &GeneratedImage,
    out: Option<&Path>,
    seen_warnings: usize,
) -> Result<()> {
    println!(
        "Created {} ({} in gallery)",
        item.id,
        studio.history().len()
    );
    if let Some(out) = out {
        let path = studio.export(Some(&item.id), Some(out))?;
        println!("Wrote {}", path.display());
    }
    for warning in studio.warnings().iter().skip(seen_warnings) {
        eprintln!("instantart: warning: {warning}");
    }
    Ok(())
}

fn run_prompt(global: &GlobalArgs, args: PromptArgs) -> Result<i32> {
    let mut studio = open_studio(global, Access::Browse)?;
    apply_config(&mut studio, &args.config);
    studio.set_mode(args.mode.parse()?);
    println!("{}", studio.preview(&args.text));
    Ok(0)
}

fn run_history(global: &GlobalArgs) -> Result<i32> {
    let studio = open_studio(global, Access::Browse)?;
    print_history(&studio);
    Ok(0)
}

fn run_show(global: &GlobalArgs, args: ShowArgs) -> Result<i32> {
    let studio = open_studio(global, Access::Browse)?;
    let Some(item) = studio.history().get(&args.id) else {
        println!("No gallery entry with id {}", args.id);
        return Ok(1);
    };
    println!("{}", serde_json::to_string_pretty(&entry_summary(item))?);
    Ok(0)
}

fn run_export(global: &GlobalArgs, args: ExportArgs) -> Result<i32> {
    let studio = open_studio(global, Access::Browse)?;
    let path = studio.export(args.id.as_deref(), args.out.as_deref())?;
    println!("Exported to {}", path.display());
    Ok(0)
}

fn run_clear(global: &GlobalArgs, args: ClearArgs) -> Result<i32> {
    let mut studio = open_studio(global, Access::Browse)?;
    if !args.yes && !confirm("Are you sure you want to clear all history?")? {
        println!("Kept {} entries.", studio.history().len());
        return Ok(0);
    }
    studio.clear_history()?;
    println!("History cleared.");
    Ok(0)
}

fn run_relay(global: &GlobalArgs) -> Result<i32> {
    let kind: GatewayKind = global.gateway.parse()?;
    let gateway = build_gateway(kind, &gateway_config(global))?;

    let mut raw = String::new();
    io::stdin()
        .read_to_string(&mut raw)
        .context("failed reading relay request from stdin")?;
    let request: Value = serde_json::from_str(&raw).context("relay request is not JSON")?;
    let method = request
        .get("httpMethod")
        .and_then(Value::as_str)
        .unwrap_or("POST");
    let body = match request.get("body") {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };

    let response = handle_relay_request(method, &body, gateway.as_ref());
    println!(
        "{}",
        json!({
            "statusCode": response.status,
            "body": response.body.to_string(),
        })
    );
    Ok(0)
}

fn run_chat(global: &GlobalArgs) -> Result<()> {
    let mut studio = open_studio(global, Access::Submit)?;
    let stdin = io::stdin();
    let mut line = String::new();

    println!(
        "InstantArt started ({} gateway, {} in gallery). Type /help for commands.",
        studio.gateway_name(),
        studio.history().len()
    );

    loop {
        print!("{}> ", studio.mode());
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let intent = parse_intent(line.trim_end_matches(['\n', '\r']));
        if intent.action == "quit" {
            break;
        }
        if let Err(err) = handle_chat_intent(&mut studio, &intent) {
            println!("Error: {err:#}");
        }
    }
    Ok(())
}

fn handle_chat_intent(studio: &mut Studio, intent: &Intent) -> Result<()> {
    let value = intent.arg("value").unwrap_or_default();
    match intent.action.as_str() {
        "noop" => {}
        "help" => println!("Commands: {}", CHAT_HELP_COMMANDS.join(" ")),
        "set_mode" => {
            studio.set_mode(value.parse()?);
            println!("Mode set to {}", studio.mode());
        }
        "set_style" => {
            if let Some(reason) = studio.set_style(value) {
                println!("{reason}");
            }
            println!("Style set to {value}");
        }
        "set_ratio" => {
            if let Some(reason) = studio.set_aspect_ratio(value) {
                println!("{reason}");
            }
            println!("Aspect ratio set to {value}");
        }
        "set_camera" => {
            studio.set_camera(value);
            println!("Camera set to {}", display_or_default(value));
        }
        "set_lighting" => {
            studio.set_lighting(value);
            println!("Lighting set to {}", display_or_default(value));
        }
        "set_mood" => {
            studio.set_mood(value);
            println!("Mood set to {}", display_or_default(value));
        }
        "set_source" => {
            let path = intent.arg("path").unwrap_or_default();
            if path.is_empty() {
                println!("/source requires a path");
                return Ok(());
            }
            studio.set_source_image(SourceImage::from_path(Path::new(path))?);
            println!("Source image set to {path} (edit mode)");
        }
        "clear_source" => {
            studio.clear_source_image();
            println!("Source image cleared");
        }
        "select" => match studio.select(value) {
            Some(item) => println!("Selected {}: {}", item.id, preview_text(&item.prompt)),
            None => println!("No gallery entry with id {value}; nothing selected"),
        },
        "export" => {
            let out = intent
                .arg("path")
                .filter(|path| !path.is_empty())
                .map(PathBuf::from);
            let path = studio.export(None, out.as_deref())?;
            println!("Exported to {}", path.display());
        }
        "history" => print_history(studio),
        "show_config" => {
            println!("{}", serde_json::to_string_pretty(studio.config())?);
            println!(
                "mode: {}, source: {}",
                studio.mode(),
                studio
                    .source_image()
                    .map(|source| source.label.as_str())
                    .unwrap_or("none")
            );
        }
        "clear_history" => {
            if confirm("Are you sure you want to clear all history?")? {
                studio.clear_history()?;
                println!("History cleared.");
            }
        }
        "list_styles" => print_styles(studio),
        "list_ratios" => print_ratios(studio),
        "unknown" => {
            println!(
                "Unknown command /{}. Type /help for commands.",
                intent.arg("command").unwrap_or_default()
            );
        }
        "submit" => {
            let prompt = intent.prompt.clone().unwrap_or_default();
            println!("Generating ({})...", studio.mode());
            match studio.submit(&prompt) {
                Ok(item) => println!(
                    "Created {} ({} in gallery)",
                    item.id,
                    studio.history().len()
                ),
                Err(err) => println!("Error: {err}"),
            }
        }
        other => bail!("unhandled action {other}"),
    }
    Ok(())
}

fn print_history(studio: &Studio) {
    if studio.history().is_empty() {
        println!("Gallery is empty.");
        return;
    }
    let current = studio.current().map(|item| item.id.clone());
    for item in studio.history().iter() {
        let marker = if current.as_deref() == Some(item.id.as_str()) {
            "*"
        } else {
            " "
        };
        println!(
            "{marker} {}  {}  {:<14} {:<5} {}{}",
            item.id,
            format_timestamp(item.timestamp),
            item.style,
            item.aspect_ratio,
            if item.is_edited { "[edit] " } else { "" },
            preview_text(&item.prompt),
        );
    }
}

fn print_styles(studio: &Studio) {
    for style in studio.builder().styles().list() {
        println!("{:<16} {:<16} {}", style.id, style.label, style.description);
    }
}

fn print_ratios(studio: &Studio) {
    for ratio in studio.builder().ratios().list() {
        println!("{:<6} {:<18} {}", ratio.id, ratio.label, ratio.size());
    }
}

fn entry_summary(item: &GeneratedImage) -> Value {
    let mut value = serde_json::to_value(item).unwrap_or(Value::Null);
    if let Some(obj) = value.as_object_mut() {
        obj.insert(
            "url".to_string(),
            Value::String(format!("<{} chars>", item.url.len())),
        );
        obj.insert(
            "created".to_string(),
            Value::String(format_timestamp(item.timestamp)),
        );
    }
    value
}

fn format_timestamp(millis: i64) -> String {
    Local
        .timestamp_millis_opt(millis)
        .single()
        .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| millis.to_string())
}

fn preview_text(text: &str) -> String {
    if text.chars().count() <= PROMPT_PREVIEW_CHARS {
        return text.to_string();
    }
    text.chars().take(PROMPT_PREVIEW_CHARS).collect::<String>() + "…"
}

fn display_or_default(value: &str) -> &str {
    if value.is_empty() {
        "(default)"
    } else {
        value
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn confirm(question: &str) -> Result<bool> {
    print!("{question} [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}
