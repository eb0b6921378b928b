use anyhow::{Context, Result, anyhow};
use nalgebra::{UnitQuaternion, Vector3};
use pico_args::Arguments;
use serde_json::{Value, json};
use std::{env, fs, path::PathBuf};

use crate::config::{ConfigState, Profile};
use crate::normalize::{gesture_feature_len, normalize};
use crate::store::{SampleKind, SampleStore};
use crate::window::WindowAggregator;

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // No args -> general help
    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            if let Some(t) = topic {
                print_subcmd_help(&t);
            } else {
                print_help();
            }
            Ok(())
        }

        Some("list") => {
            let kinds = optional_kinds(&mut pargs)?;
            let state = ConfigState::load_or_install_default()?;
            let store = SampleStore::open(state.store_path());
            print_response(&list_report(&store, &kinds));
            Ok(())
        }

        Some("show") => {
            let (kind, name) = kind_and_name(&mut pargs, "show")?;
            let state = ConfigState::load_or_install_default()?;
            let store = SampleStore::open(state.store_path());
            let sample = store
                .get(kind, &name)
                .ok_or_else(|| anyhow!("no {kind} named '{name}'"))?;
            print_response(&json!({
                "kind": kind.to_string(),
                "name": name,
                "index": sample.index,
                "samples": sample.data.len(),
                "data": sample.data,
            }));
            Ok(())
        }

        Some("delete") => {
            let (kind, name) = kind_and_name(&mut pargs, "delete")?;
            let state = ConfigState::load_or_install_default()?;
            let mut store = SampleStore::open(state.store_path());
            let deleted = store.delete(kind, &name)?;
            print_response(&json!({
                "deleted": deleted,
                "remaining": entries(&store, kind),
            }));
            Ok(())
        }

        Some("reset") => {
            let kinds = optional_kinds(&mut pargs)?;
            let state = ConfigState::load_or_install_default()?;
            let mut store = SampleStore::open(state.store_path());
            if kinds.len() == 2 {
                store.reset()?;
            } else {
                for kind in &kinds {
                    store.reset_kind(*kind)?;
                }
            }
            print_response(&list_report(&store, &kinds));
            Ok(())
        }

        Some("export") => {
            let out: PathBuf = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: handsign export <path>"))?;
            let state = ConfigState::load_or_install_default()?;
            let store = SampleStore::open(state.store_path());
            let set = store.assemble_training_set();
            let txt = serde_json::to_string(&set)?;
            fs::write(&out, txt).with_context(|| format!("failed to write {}", out.display()))?;
            print_response(&json!({
                "path": out,
                "vectors": set.inputs.len(),
                "classes": store.len(SampleKind::Pose),
            }));
            Ok(())
        }

        Some("features") => {
            let input: PathBuf = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: handsign features <trajectory.json>"))?;
            let txt = fs::read_to_string(&input)
                .with_context(|| format!("failed to read {}", input.display()))?;
            let points: Vec<[f32; 3]> = serde_json::from_str(&txt)
                .with_context(|| format!("{} is not a list of [x, y, z] points", input.display()))?;
            let state = ConfigState::load_or_install_default()?;
            print_response(&features_report(&state.profile, &points)?);
            Ok(())
        }

        Some("profiles") => {
            let state = ConfigState::load_or_install_default()?;
            let list: Vec<String> = state
                .list_profiles()
                .into_iter()
                .map(|p| {
                    if p == state.active_name {
                        format!("*{p}")
                    } else {
                        p
                    }
                })
                .collect();
            print_response(&json!({ "profiles": list }));
            Ok(())
        }

        Some("use") => {
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: handsign use <profile_name>"))?;
            let mut state = ConfigState::load_or_install_default()?;
            state.set_active(&name)?;
            print_response(&json!({ "active_profile": state.active_name }));
            Ok(())
        }

        Some("config") => {
            let state = ConfigState::load_or_install_default()?;
            print_response(&json!({
                "active_profile": state.active_name,
                "profile": serde_json::to_value(&state.profile)?,
                "store_path": state.store_path(),
            }));
            Ok(())
        }

        Some("doctor") => {
            let state = ConfigState::load_or_install_default()?;
            print_response(&state.doctor_report());
            Ok(())
        }

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

fn optional_kinds(pargs: &mut Arguments) -> Result<Vec<SampleKind>> {
    let arg: Option<String> = pargs.free_from_str().ok();
    match arg {
        None => Ok(vec![SampleKind::Pose, SampleKind::Gesture]),
        Some(s) => Ok(vec![s.parse::<SampleKind>().map_err(|e| anyhow!(e))?]),
    }
}

fn kind_and_name(pargs: &mut Arguments, cmd: &str) -> Result<(SampleKind, String)> {
    let usage = || anyhow!("usage: handsign {cmd} <pose|gesture> <name>");
    let kind: String = pargs.free_from_str().map_err(|_| usage())?;
    let name: String = pargs.free_from_str().map_err(|_| usage())?;
    let kind = kind.parse::<SampleKind>().map_err(|e| anyhow!(e))?;
    Ok((kind, name))
}

fn entries(store: &SampleStore, kind: SampleKind) -> Value {
    let list: Vec<Value> = store
        .names(kind)
        .into_iter()
        .filter_map(|name| {
            let s = store.get(kind, &name)?;
            Some(json!({ "name": name, "index": s.index, "samples": s.data.len() }))
        })
        .collect();
    Value::Array(list)
}

pub fn list_report(store: &SampleStore, kinds: &[SampleKind]) -> Value {
    let mut out = serde_json::Map::new();
    for kind in kinds {
        let key = match kind {
            SampleKind::Pose => "poses",
            SampleKind::Gesture => "gestures",
        };
        out.insert(key.to_string(), entries(store, *kind));
    }
    Value::Object(out)
}

/// Window ladder and normalized feature vectors the active profile would feed
/// the gesture model for a recorded primary-joint trajectory.
pub fn features_report(profile: &Profile, points: &[[f32; 3]]) -> Result<Value> {
    let buffer = profile.buffer_config();
    let gesture = profile.gesture_config();
    let trajectory: Vec<Vector3<f32>> = points.iter().map(|p| Vector3::from(*p)).collect();

    let windows = WindowAggregator::new(&buffer)
        .windows_for(
            &trajectory,
            gesture.interval_secs,
            gesture.min_interval_secs,
            gesture.strategy,
        )
        .ok_or_else(|| anyhow!("trajectory is empty or shorter than the deadzone"))?;

    let reference = UnitQuaternion::identity();
    let mut out = Vec::with_capacity(windows.len());
    for w in &windows {
        let features = normalize(&w.points, &reference, gesture.bounding_cube_size)
            .map_err(|e| anyhow!("window of {:.2}s: {e}", w.span_secs))?;
        out.push(json!({
            "span_secs": w.span_secs,
            "path_length": w.path_length(),
            "features": features,
        }));
    }
    Ok(json!({
        "strategy": gesture.strategy.as_str(),
        "samples": trajectory.len(),
        "model_input_len": gesture_feature_len(buffer.capacity()),
        "windows": out,
    }))
}

fn print_help() {
    println!(
        r#"handsign: hand gesture and pose recognition toolkit

USAGE:
  handsign help [command]                   Show general or command-specific help
  handsign list [poses|gestures]            List stored labels and their indices
  handsign show <pose|gesture> <name>       Print one label with its samples
  handsign delete <pose|gesture> <name>     Delete a label (highest index takes its slot)
  handsign reset [poses|gestures]           Clear stored samples
  handsign export <path>                    Write the pose training set as JSON
  handsign features <trajectory.json>       Normalize a recorded trajectory
  handsign profiles                         List profiles
  handsign use <name>                       Switch active profile
  handsign config                           Print the active profile
  handsign doctor                           Check paths and store health

TIPS:
  - Profiles: ~/.config/handsign/profiles
  - Active profile pointer: ~/.config/handsign/active
  - Samples: ~/.local/share/handsign/PoseGestureData.json
  - RUST_LOG=debug shows per-tick diagnostics
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "list" => println!(
            "usage: handsign list [poses|gestures]\nLists labels with index and sample count."
        ),
        "show" => println!(
            "usage: handsign show <pose|gesture> <name>\nPrints the index and feature vectors of a label."
        ),
        "delete" => println!(
            "usage: handsign delete <pose|gesture> <name>\nDeletes a label. The label holding the highest index moves into the freed one."
        ),
        "reset" => println!(
            "usage: handsign reset [poses|gestures]\nDeletes every label of the given kind, or of both."
        ),
        "export" => println!(
            "usage: handsign export <path>\nWrites {{\"inputs\": [...], \"labels\": [...]}} built from stored poses."
        ),
        "features" => println!(
            "usage: handsign features <trajectory.json>\nReads a JSON list of [x, y, z] points and prints each window's normalized features."
        ),
        "profiles" => println!("usage: handsign profiles\nLists profiles; marks active with '*'."),
        "use" => println!("usage: handsign use <name>\nSwitches active profile to <name>."),
        "config" => println!("usage: handsign config\nPrints the active profile as JSON."),
        "doctor" => println!(
            "usage: handsign doctor\nShows config and store paths, store health and class counts."
        ),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_response(v: &Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}
