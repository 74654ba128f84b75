//! sim-runner: headless runner for the demonstration models.
//!
//! Usage:
//!   sim-runner --model greet --seed 12345 --duration 100 --tick 1
//!   sim-runner --model growth --db run.db
//!   sim-runner --model growth --print        (records go to the log at info level)
//!   sim-runner --config scenario.json

use anyhow::{bail, Result};
use serde_json::{json, Value};
use simclock_core::{
    config::{LoggerConfig, ScenarioConfig},
    logger::LogSink,
    named,
    rng::SimRng,
    store::SimStore,
    Action, Clock, LogMode, Logger,
};
use std::{cell::RefCell, collections::HashMap, env, rc::Rc};

/// Everything the models' actions share.
struct World {
    rng:    SimRng,
    logger: Logger,
    vars:   HashMap<String, Value>,
}

type Scope = Rc<RefCell<World>>;

// ── greet ───────────────────────────────────────────────────────────────────

/// Greets, then passes the word to the other passer-by after a random delay.
struct Passerby {
    name:  &'static str,
    other: &'static str,
}

impl Action<Scope> for Passerby {
    fn label(&self) -> &str {
        self.name
    }

    fn execute(&mut self, clock: &mut Clock<Scope>, world: &Scope) -> anyhow::Result<()> {
        let delay = {
            let mut w = world.borrow_mut();
            let greetings = w.vars.get("greetings").and_then(Value::as_u64).unwrap_or(0) + 1;
            w.vars.insert("greetings".into(), json!(greetings));
            w.vars.insert("speaker".into(), json!(self.name));
            w.rng.exponential(1.0)
        };
        log::info!("t={:.3} {} greets {}", clock.now(), self.name, self.other);

        let reply = Passerby { name: self.other, other: self.name };
        clock.schedule_after(reply, world.clone(), delay, 0.0)?;
        Ok(())
    }
}

fn build_greet(clock: &mut Clock<Scope>, world: &Scope) -> Result<()> {
    let start = {
        let mut w = world.borrow_mut();
        w.vars.insert("greetings".into(), json!(0));
        w.vars.insert("speaker".into(), Value::Null);
        w.rng.uniform(0.0, 5.0)
    };
    clock.schedule_at(Passerby { name: "foo", other: "bar" }, world.clone(), start, 0.0)?;
    clock.register_sample(
        named("census", |_: &mut Clock<Scope>, world: &Scope| {
            let mut guard = world.borrow_mut();
            let w = &mut *guard;
            w.logger.record(&w.vars)?;
            Ok(())
        }),
        world.clone(),
    );
    Ok(())
}

// ── growth ──────────────────────────────────────────────────────────────────

/// a grows by a random step every unit; b = a², c = a³.
fn build_growth(clock: &mut Clock<Scope>, world: &Scope) -> Result<()> {
    {
        let mut w = world.borrow_mut();
        for var in ["a", "b", "c"] {
            w.vars.insert(var.into(), json!(1.0));
        }
    }
    let grow = named("grow", |_: &mut Clock<Scope>, world: &Scope| {
        let mut guard = world.borrow_mut();
        let w = &mut *guard;
        let step = w.rng.uniform(0.5, 1.5);
        let a = w.vars.get("a").and_then(Value::as_f64).unwrap_or(1.0) + step;
        w.vars.insert("a".into(), json!(a));
        w.vars.insert("b".into(), json!(a * a));
        w.vars.insert("c".into(), json!(a * a * a));
        w.logger.record(&w.vars)?;
        Ok(())
    });
    clock.schedule_after(grow, world.clone(), 1.0, 1.0)?;
    Ok(())
}

// ── main ────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let mut config = match str_arg(&args, "--config") {
        Some(path) => ScenarioConfig::load(path)?,
        None => ScenarioConfig::default(),
    };
    let model = str_arg(&args, "--model").unwrap_or("greet");
    config.seed = parse_arg(&args, "--seed", config.seed);
    config.duration = parse_arg(&args, "--duration", config.duration);
    config.clock.tick_interval = parse_arg(&args, "--tick", config.clock.tick_interval);
    let db = str_arg(&args, "--db").unwrap_or(":memory:");
    let print = args.iter().any(|a| a == "--print");

    if config.logger.variables.is_empty() {
        config.logger = default_logger(model)?;
    }
    if print {
        config.logger.mode = LogMode::Print;
    }
    // The greet census samples on ticks; give it a grid if none was asked for.
    if model == "greet" && config.clock.tick_interval == 0.0 {
        config.clock.tick_interval = 1.0;
    }

    println!("sim-runner");
    println!("  model:     {model}");
    println!("  seed:      {}", config.seed);
    println!("  duration:  {}", config.duration);
    println!("  tick:      {}", config.clock.tick_interval);
    println!("  logger:    {:?}", config.logger.mode);
    println!("  db:        {db}");
    println!();

    let mut clock: Clock<Scope> = Clock::from_config(&config.clock)?;
    clock.enable_trace();
    let logger = Logger::from_config_with_sink(&config.logger, &clock, LogSink)?;
    let world = Rc::new(RefCell::new(World {
        rng: SimRng::new(config.seed, 0).with_name("model"),
        logger,
        vars: HashMap::new(),
    }));

    match model {
        "greet" => build_greet(&mut clock, &world)?,
        "growth" => build_growth(&mut clock, &world)?,
        other => bail!("unknown model '{other}' (expected greet or growth)"),
    }

    clock.run(config.duration)?;

    let mut store = SimStore::open(db)?;
    store.migrate()?;
    let run_id = uuid::Uuid::new_v4().to_string();
    let started_at = chrono::Utc::now().to_rfc3339();
    store.insert_run(&run_id, model, config.seed, &started_at)?;

    let trace = clock.take_trace();
    store.append_trace(&run_id, &trace)?;
    let w = world.borrow();
    store.save_records(&run_id, w.logger.table())?;

    print_summary(&clock, &w.logger, &run_id, trace.len());
    Ok(())
}

fn default_logger(model: &str) -> Result<LoggerConfig> {
    let variables = match model {
        "greet" => vec!["greetings".into(), "speaker".into()],
        "growth" => vec!["a".into(), "b".into(), "c".into()],
        other => bail!("unknown model '{other}' (expected greet or growth)"),
    };
    Ok(LoggerConfig {
        variables,
        mode: LogMode::Store,
        policy: Default::default(),
    })
}

fn print_summary(clock: &Clock<Scope>, logger: &Logger, run_id: &str, trace_len: usize) {
    println!("=== RUN SUMMARY ===");
    println!("  run_id:         {run_id}");
    println!("  start time:     {}", clock.start_time());
    println!("  final time:     {}", clock.now());
    println!("  state:          {:?}", clock.state());
    println!("  events fired:   {}", clock.events_fired());
    println!("  ticks fired:    {}", clock.ticks_fired());
    println!("  still queued:   {}", clock.queued_events());
    println!("  trace entries:  {trace_len}");
    println!("  records stored: {}", logger.table().len());
    if let Some(last) = logger.last() {
        println!("  last record:    {last}");
    }
}

fn str_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
