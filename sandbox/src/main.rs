// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Tempo Sandbox
// Drives a scheduler with a fixed-step frame loop.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use anyhow::{Context, Result};
use tempo_scheduler::{
    Repeat, Scheduler, SchedulerConfig, TimerOptions, Updatable, PRIORITY_SYSTEM,
};

const FRAME_DT: f64 = 1.0 / 60.0;
const FRAME_COUNT: u32 = 240;
const CONFIG_ENV: &str = "TEMPO_CONFIG";

/// A moving entity updated through its default update.
struct Player {
    position: f64,
    speed: f64,
}

impl Updatable for Player {
    fn update(&mut self, _scheduler: &mut Scheduler, dt: f64) {
        self.position += self.speed * dt;
    }
}

fn load_config() -> Result<SchedulerConfig> {
    match std::env::var(CONFIG_ENV) {
        Ok(path) => {
            let config = SchedulerConfig::from_file(&path)
                .with_context(|| format!("Failed to load scheduler config from '{path}'"))?;
            log::info!("Loaded scheduler config from '{path}'.");
            Ok(config)
        }
        Err(_) => Ok(SchedulerConfig::default()),
    }
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let mut scheduler = Scheduler::with_config(load_config()?);

    // --- Targets ---
    let player = Rc::new(RefCell::new(Player {
        position: 0.0,
        speed: 3.0,
    }));
    let player_id = scheduler.register_updatable(&player);
    let hud = scheduler.register_target();
    let spawner = scheduler.register_target();
    let director = scheduler.register_target();

    // --- Per-frame updates ---
    scheduler.schedule_update(player_id, 0, false)?;

    let frames = Rc::new(Cell::new(0u32));
    let frame_counter = frames.clone();
    scheduler.schedule_update_with(hud, PRIORITY_SYSTEM, false, move |_, _| {
        frame_counter.set(frame_counter.get() + 1);
    })?;

    // --- Timers ---
    let spawned = Rc::new(Cell::new(0u32));
    let spawn_count = spawned.clone();
    scheduler.schedule(
        "spawn",
        spawner,
        TimerOptions::new(0.5).with_repeat(Repeat::Times(3)).with_delay(1.0),
        move |_, elapsed| {
            spawn_count.set(spawn_count.get() + 1);
            log::info!("Spawned wave {} (elapsed {elapsed:.3}s).", spawn_count.get());
        },
    )?;

    scheduler.schedule(
        "slow-motion",
        director,
        TimerOptions::new(2.0).with_repeat(Repeat::Times(0)),
        move |scheduler, _| {
            log::info!("Entering slow motion.");
            scheduler.set_time_scale(0.5);
        },
    )?;

    // --- Frame loop ---
    for frame in 0..FRAME_COUNT {
        if frame == 150 {
            let paused = scheduler.pause_all_targets_with_min_priority(0);
            log::info!("Paused {} targets.", paused.len());
            for _ in 0..30 {
                scheduler.tick(FRAME_DT);
            }
            scheduler.resume_targets(&paused);
            log::info!("Resumed {} targets.", paused.len());
        }
        scheduler.tick(FRAME_DT);
    }

    log::info!(
        "Ran {} frames: player at {:.3}, {} waves spawned, time scale {}.",
        frames.get(),
        player.borrow().position,
        spawned.get(),
        scheduler.time_scale()
    );

    scheduler.release_target(player_id)?;
    scheduler.unschedule_all();
    Ok(())
}
