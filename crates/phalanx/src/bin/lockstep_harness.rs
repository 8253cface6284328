//! # Lockstep Harness
//!
//! Runs a session file on two peers and reports the first desync.
//!
//! Usage: `lockstep_harness [session.toml] [--hashes]`
//!
//! Without a file the built-in demo session runs. Exits non-zero on a
//! desync or a kernel error.

use std::path::Path;
use std::process::ExitCode;

use phalanx::lockstep::run;
use phalanx::session::SessionFile;

fn main() -> ExitCode {
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         PHALANX LOCKSTEP HARNESS                                 ║");
    println!("║         TWO PEERS, ONE TRUTH                                     ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let show_hashes = args.iter().any(|a| a == "--hashes");
    let path = args.iter().find(|a| !a.starts_with("--"));

    let loaded = match path {
        Some(path) => {
            println!("Loading session: {path}");
            SessionFile::load(Path::new(path))
        }
        None => {
            println!("No session file given, running the built-in demo");
            SessionFile::demo()
        }
    };
    let session = match loaded {
        Ok(session) => session,
        Err(e) => {
            println!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    println!();
    println!("┌─ SESSION ─────────────────────────────────────────────────────────┐");
    println!("│ Map:                {} ({}x{})", session.kernel.map.title, session.kernel.map.width, session.kernel.map.height);
    println!("│ Seed:               {}", session.kernel.random_seed);
    println!("│ Players:            {}", session.players);
    println!("│ Units:              {}", session.spawns.len());
    println!("│ Scripted orders:    {}", session.orders.len());
    println!("│ Ticks:              {}", session.ticks);
    println!("└───────────────────────────────────────────────────────────────────┘");
    println!();

    let report = match run(&session) {
        Ok(report) => report,
        Err(e) => {
            println!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if show_hashes {
        for (frame, hash) in report.hashes.iter().enumerate() {
            println!("  frame {:>5}  {hash:>12}", frame + 1);
        }
        println!();
    }

    println!("┌─ RESULTS ─────────────────────────────────────────────────────────┐");
    println!("│ Frames run:         {}", report.frames);
    match report.final_hash() {
        Some(hash) => println!("│ Final hash:         {hash}"),
        None => println!("│ Final hash:         -"),
    }
    println!("│ Game over:          {}", report.game_over);
    for (player, outcome) in &report.outcomes {
        println!("│ {player}:                 {outcome:?}");
    }
    println!("└───────────────────────────────────────────────────────────────────┘");
    println!();

    match report.desync {
        None => {
            println!("✓ Peers stayed in sync");
            ExitCode::SUCCESS
        }
        Some(desync) => {
            println!(
                "✗ DESYNC at frame {}: {} vs {}",
                desync.frame, desync.hashes[0], desync.hashes[1]
            );
            for entity in &desync.entities {
                println!("  - diverging entity {entity}");
            }
            ExitCode::FAILURE
        }
    }
}
