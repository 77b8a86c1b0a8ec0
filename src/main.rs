use anyhow::Result;
use std::env;
use std::path::PathBuf;

use mcmv_explorer::{load_financed, load_union};

const DEFAULT_UNION_CSV: &str = "minha_casa_minha_vida_uniao_definitivo.csv";
const DEFAULT_FINANCED_CSV: &str = "minha_casa_minha_vida_financiado_definitivo.csv";

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    let union_path = PathBuf::from(args.get(1).map(String::as_str).unwrap_or(DEFAULT_UNION_CSV));
    let financed_path =
        PathBuf::from(args.get(2).map(String::as_str).unwrap_or(DEFAULT_FINANCED_CSV));

    run_ui_mode(union_path, financed_path)
}

#[cfg(feature = "tui")]
fn run_ui_mode(union_path: PathBuf, financed_path: PathBuf) -> Result<()> {
    println!("🏠 Minha Casa Minha Vida - Análise de Dados");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    println!("\n📂 Loading base tables...");
    let union = load_union(&union_path)?;
    println!("✓ Loaded {} union records from {}", union.len(), union_path.display());
    let financed = load_financed(&financed_path)?;
    println!(
        "✓ Loaded {} financed records from {}",
        financed.len(),
        financed_path.display()
    );

    println!("\nStarting UI... (Press 'q' to quit)\n");

    let mut app = mcmv_explorer::ui::App::new(union, financed);
    mcmv_explorer::ui::run_ui(&mut app)?;

    println!("\n✅ UI closed successfully");

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_union_path: PathBuf, _financed_path: PathBuf) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    std::process::exit(1);
}
