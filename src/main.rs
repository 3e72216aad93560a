use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, Utc};
use clap::Parser;
use rand::Rng;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use batch_lite::config::{ExecutorConfig, SchedulerConfig};
use batch_lite::scheduler::{
    CompletionSink, JobQueue, JobRecord, Scheduler, SchedulingPolicy, StatsSnapshot,
};
use batch_lite::shutdown::install_shutdown_handler;
use batch_lite::worker::{CommandExecutor, CurrentJob, Dispatcher, SimulatedExecutor};

#[derive(Parser, Debug)]
#[command(name = "batch-lite")]
#[command(version)]
#[command(about = "A single-server batch job scheduler with switchable policies")]
struct Args {
    /// Maximum number of waiting jobs (submissions block when full).
    /// Unbounded when omitted; must be at least 1.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    queue_capacity: Option<u64>,

    /// Scheduling policy active at startup (FCFS, SJF, or Priority)
    #[arg(long, default_value = "FCFS")]
    policy: String,

    /// Run jobs through this benchmark program (invoked with the job's
    /// duration in seconds) instead of the in-process simulation
    #[arg(long)]
    benchmark: Option<PathBuf>,
}

const HELP: &str = "
Commands:
  run <name> <cpu_time> [priority]   Submit a job (cpu_time in seconds)
  list                               Display the job queue
  fcfs | sjf | priority              Switch the scheduling policy
  stats [json]                       Show performance statistics
  test <name> <policy> <num_jobs> <priority_levels> <min_cpu> <max_cpu>
                                     Run an automated performance test
  help                               Show this message
  quit                               Print the final report and exit
";

fn spawn_dispatcher(
    config: &ExecutorConfig,
    queue: Arc<JobQueue>,
    sink: Arc<dyn CompletionSink>,
    shutdown: CancellationToken,
) -> (CurrentJob, JoinHandle<()>) {
    match config {
        ExecutorConfig::Simulated => {
            let dispatcher = Dispatcher::new(queue, SimulatedExecutor, sink, shutdown);
            let current = dispatcher.current_job();
            (current, tokio::spawn(dispatcher.run()))
        }
        ExecutorConfig::Benchmark { program } => {
            let dispatcher =
                Dispatcher::new(queue, CommandExecutor::new(program), sink, shutdown);
            let current = dispatcher.current_job();
            (current, tokio::spawn(dispatcher.run()))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let policy: SchedulingPolicy = args.policy.parse()?;
    let mut config = SchedulerConfig::default().with_policy(policy);
    if let Some(capacity) = args.queue_capacity {
        config = config.with_capacity(capacity as usize);
    }
    if let Some(program) = &args.benchmark {
        config = config.with_benchmark(program);
    }

    let queue = Arc::new(match config.queue_capacity {
        Some(capacity) => JobQueue::bounded(capacity).with_policy(config.default_policy),
        None => JobQueue::new().with_policy(config.default_policy),
    });
    let scheduler = Arc::new(Scheduler::new(queue.clone()));
    let shutdown = install_shutdown_handler(queue.clone());

    let (current, dispatcher_handle) = spawn_dispatcher(
        &config.executor,
        queue.clone(),
        scheduler.clone(),
        shutdown.clone(),
    );

    println!("Welcome to batch-lite. Type 'help' to see available commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("batch> ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => match line? {
                Some(line) => line,
                None => break, // EOF
            },
        };

        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            [] => {}
            ["help"] => println!("{HELP}"),
            ["run", rest @ ..] => cmd_run(rest, &scheduler, &queue, &current).await,
            ["list"] => cmd_list(&queue, &current),
            ["fcfs"] | ["sjf"] | ["priority"] => {
                if scheduler.change_policy(parts[0]) {
                    println!("\nScheduling policy is switched to {}.\n", queue.active_policy());
                }
            }
            ["stats"] => print_stats(&scheduler.performance_stats(), false),
            ["stats", "json"] => print_stats(&scheduler.performance_stats(), true),
            ["test", rest @ ..] => cmd_test(rest, &scheduler, &shutdown).await,
            ["quit"] | ["exit"] => break,
            [command, ..] => {
                println!("Unknown command: {command}. Type 'help' for a list of commands.")
            }
        }
    }

    // Final report, then let the in-flight job finish before exiting.
    print_stats(&scheduler.performance_stats(), false);
    println!("Shutting down batch-lite...");
    shutdown.cancel();
    queue.close();
    dispatcher_handle.await?;
    Ok(())
}

async fn cmd_run(
    args: &[&str],
    scheduler: &Scheduler,
    queue: &JobQueue,
    current: &CurrentJob,
) {
    let (name, cpu_time, priority) = match args {
        [name, cpu_time] => (*name, *cpu_time, "0"),
        [name, cpu_time, priority] => (*name, *cpu_time, *priority),
        _ => {
            println!("Usage: run <name> <cpu_time> [priority]");
            return;
        }
    };

    let (Ok(secs), Ok(priority)) = (cpu_time.parse::<f64>(), priority.parse::<i32>()) else {
        println!("Error: cpu_time must be a number and priority an integer");
        return;
    };
    if !secs.is_finite() || secs <= 0.0 {
        println!("Error: cpu_time must be a positive number of seconds");
        return;
    }

    match scheduler
        .submit_job(name, Duration::from_secs_f64(secs), priority)
        .await
    {
        Ok(job) => {
            println!("\nJob {} was submitted.", job.name());
            println!("Total number of jobs in the queue: {}", queue.len());
            println!(
                "Expected waiting time: {:.2} seconds",
                expected_waiting_time(&job, queue, current)
            );
            println!("Scheduling Policy: {}\n", queue.active_policy());
        }
        Err(err) => println!("Error: {err}"),
    }
}

fn cmd_list(queue: &JobQueue, current: &CurrentJob) {
    let jobs = queue.snapshot();
    println!("\nTotal number of jobs in the queue: {}", jobs.len());
    println!("Scheduling Policy: {}", queue.active_policy());

    let running = current.get();
    if running.is_some() || !jobs.is_empty() {
        println!("\nName\tCPU_Time\tPri\tArrival_Time\tStatus");
        println!("-------------------------------------------------------");
        if let Some(job) = &running {
            print_job_line(job);
        }
        for job in &jobs {
            print_job_line(job);
        }
    }
    println!();
}

fn print_job_line(job: &JobRecord) {
    let arrival = job
        .arrival_time()
        .map(|t| t.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "N/A".to_string());
    println!(
        "{}\t{:.2}\t\t{}\t{}\t{}",
        job.name(),
        job.exec_time().as_secs_f64(),
        job.priority(),
        arrival,
        job.status()
    );
}

/// Remaining time of the running job plus the execution time of every queued
/// job that would dispatch before `job` under the active policy.
fn expected_waiting_time(job: &JobRecord, queue: &JobQueue, current: &CurrentJob) -> f64 {
    let mut waiting = 0.0;

    if let Some(running) = current.get() {
        if let Some(start) = running.start_time() {
            let elapsed = (Utc::now() - start).num_milliseconds() as f64 / 1e3;
            waiting += (running.exec_time().as_secs_f64() - elapsed).max(0.0);
        }
    }

    let policy = queue.active_policy();
    for queued in queue.snapshot() {
        if queued.id() == job.id() {
            continue;
        }
        let ahead = match policy {
            SchedulingPolicy::Fcfs => queued.arrival_time() <= job.arrival_time(),
            SchedulingPolicy::Sjf => queued.exec_time() <= job.exec_time(),
            SchedulingPolicy::Priority => queued.priority() >= job.priority(),
        };
        if ahead {
            waiting += queued.exec_time().as_secs_f64();
        }
    }
    waiting
}

async fn cmd_test(args: &[&str], scheduler: &Scheduler, shutdown: &CancellationToken) {
    let [name, policy, num_jobs, priority_levels, min_cpu, max_cpu] = args else {
        println!(
            "Usage: test <name> <policy> <num_jobs> <priority_levels> <min_cpu> <max_cpu>"
        );
        return;
    };

    let Ok(policy) = policy.parse::<SchedulingPolicy>() else {
        println!("Error: Unknown policy '{policy}'");
        return;
    };
    let (Ok(num_jobs), Ok(levels), Ok(min_cpu), Ok(max_cpu)) = (
        num_jobs.parse::<u32>(),
        priority_levels.parse::<i32>(),
        min_cpu.parse::<f64>(),
        max_cpu.parse::<f64>(),
    ) else {
        println!("Error: Invalid numeric parameters");
        return;
    };
    if num_jobs == 0 || levels < 1 || min_cpu <= 0.0 || max_cpu < min_cpu {
        println!("Error: Invalid test parameters");
        return;
    }

    scheduler.set_policy(policy);
    println!("\nRunning performance test with {policy} policy...");
    println!(
        "Submitting {num_jobs} jobs with CPU time between {min_cpu} and {max_cpu} seconds..."
    );

    // Pre-generate the workload so the RNG is not held across awaits.
    let workload: Vec<(String, f64, i32)> = {
        let mut rng = rand::thread_rng();
        (0..num_jobs)
            .map(|i| {
                (
                    format!("{name}_{i}"),
                    rng.gen_range(min_cpu..=max_cpu),
                    rng.gen_range(0..levels),
                )
            })
            .collect()
    };

    let before = {
        let stats = scheduler.performance_stats();
        stats.completed_jobs + stats.failed_jobs
    };

    for (job_name, secs, priority) in workload {
        if let Err(err) = scheduler
            .submit_job(&job_name, Duration::from_secs_f64(secs), priority)
            .await
        {
            println!("Error submitting {job_name}: {err}");
        }
    }

    // Wait for the batch to drain.
    loop {
        let stats = scheduler.performance_stats();
        if stats.completed_jobs + stats.failed_jobs >= before + u64::from(num_jobs) {
            break;
        }
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = tokio::time::sleep(Duration::from_millis(100)) => {}
        }
    }

    print_stats(&scheduler.performance_stats(), false);
}

fn print_stats(stats: &StatsSnapshot, json: bool) {
    if json {
        match serde_json::to_string_pretty(stats) {
            Ok(out) => println!("{out}"),
            Err(err) => println!("Error serializing stats: {err}"),
        }
        return;
    }

    println!("\nPerformance Data:");
    println!("Total number of jobs submitted: {}", stats.total_jobs);
    println!("Total number of jobs completed: {}", stats.completed_jobs);
    if stats.failed_jobs > 0 {
        println!("Total number of jobs failed: {}", stats.failed_jobs);
    }

    if stats.completed_jobs > 0 {
        println!(
            "Average turnaround time: {:.2} seconds",
            stats.avg_response_time
        );
        println!("Throughput: {:.2} jobs per second", stats.throughput);

        println!("\nScheduling Policy Statistics:");
        for policy in SchedulingPolicy::ALL {
            let bucket = stats.policies.get(policy);
            if bucket.jobs > 0 {
                println!("  {policy}:");
                println!("    Jobs completed: {}", bucket.jobs);
                println!(
                    "    Average turnaround time: {:.2} seconds",
                    bucket.avg_response_time
                );
            }
        }
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_queue_capacity_is_rejected_at_the_flag() {
        let parsed = Args::try_parse_from(["batch-lite", "--queue-capacity", "0"]);
        assert!(parsed.is_err(), "a zero-slot queue must not be accepted");
    }

    #[test]
    fn positive_queue_capacity_parses() {
        let args = Args::try_parse_from(["batch-lite", "--queue-capacity", "8"]).unwrap();
        assert_eq!(args.queue_capacity, Some(8));
    }
}
