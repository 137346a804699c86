mod common;

use common::{env, env_sized, trivial_image};
use dos::{CliSpec, FileSystem, SpawnConfig, MIN_STACK};
use types::DosError;

#[test]
fn small_stack_requests_are_clamped() {
    let env = env(&[]);
    let mut cfg = SpawnConfig::new("clamped");
    cfg.entry = Some(0x1000);
    cfg.stack_size = 100;

    let endpoint = env.dos.spawn(&cfg).unwrap();
    let stack = env.dos.with_process(endpoint, |p| p.stack.len).unwrap();
    assert_eq!(stack, MIN_STACK);
}

#[test]
fn argument_strings_are_copied_into_guest_memory() {
    let env = env(&[]);
    let args = String::from("hello world");
    let mut cfg = SpawnConfig::new("echo");
    cfg.entry = Some(0x1000);
    cfg.args = &args;

    let endpoint = env.dos.spawn(&cfg).unwrap();
    drop(args); // the spawned process must not alias the caller's buffer

    let buf = env.dos.with_process(endpoint, |p| p.args).unwrap();
    assert_eq!(buf.len, 12);
    let mut copied = vec![0u8; buf.len as usize];
    env.emu.memory().read_bytes(buf.addr, &mut copied);
    assert_eq!(&copied, b"hello world\0");
}

#[test]
fn spawn_without_entry_or_seglist_is_rejected_before_allocating() {
    let env = env(&[]);
    let baseline = env.emu.memory().free_bytes();

    let cfg = SpawnConfig::new("nothing");
    assert_eq!(env.dos.spawn(&cfg), Err(DosError::MissingEntry));
    assert_eq!(env.dos.io_err(), 116);
    assert_eq!(env.emu.memory().free_bytes(), baseline);
    assert_eq!(env.dos.process_count(), 0);
    assert_eq!(env.emu.ready_len(), 0);
}

#[test]
fn entry_defaults_to_the_first_executable_byte() {
    let env = env(&[("prog", trivial_image())]);
    let seg = env.dos.load_seg("prog").unwrap();

    let mut cfg = SpawnConfig::new("prog");
    cfg.seglist = Some(seg);
    let endpoint = env.dos.spawn(&cfg).unwrap();

    let entry = env.dos.with_process(endpoint, |p| p.entry).unwrap();
    assert_eq!(entry, seg.addr() + 4);
}

#[test]
fn spawned_processes_land_on_the_ready_queue() {
    let env = env(&[]);
    let mut cfg = SpawnConfig::new("worker");
    cfg.entry = Some(0x2000);

    let endpoint = env.dos.spawn(&cfg).unwrap();
    assert_eq!(env.emu.take_ready(), Some(endpoint));
    assert!(env.emu.interrupts_enabled());
    // Not a CLI process: no task number claimed.
    let number = env.dos.with_process(endpoint, |p| p.task_number).unwrap();
    assert_eq!(number, 0);
    assert_eq!(env.dos.max_cli(), 0);
}

#[test]
fn cli_processes_claim_a_task_number() {
    let env = env(&[]);
    let mut cfg = SpawnConfig::new("shell");
    cfg.entry = Some(0x2000);
    cfg.cli = Some(CliSpec::default());

    let endpoint = env.dos.spawn(&cfg).unwrap();
    let number = env.dos.with_process(endpoint, |p| p.task_number).unwrap();
    assert_ne!(number, 0);
    // Slot occupancy is the proof of life for the numbered process.
    assert_eq!(env.dos.find_cli(number), endpoint);

    let name = env.dos.with_process(endpoint, |p| p.cli.as_ref().unwrap().command_name).unwrap();
    let mut copied = vec![0u8; 6];
    env.emu.memory().read_bytes(name.addr, &mut copied);
    assert_eq!(&copied, b"shell\0");
}

#[test]
fn cli_allocation_failure_rolls_the_whole_spawn_back() {
    // Arena sized so the stack, endpoint, and argument copy fit but the
    // first CLI buffer does not.
    let env = env_sized(4352, &[]);
    let baseline = env.emu.memory().free_bytes();

    let mut cfg = SpawnConfig::new("shell");
    cfg.entry = Some(0x2000);
    cfg.cli = Some(CliSpec::default());

    assert_eq!(env.dos.spawn(&cfg), Err(DosError::NoFreeStore));
    assert_eq!(env.dos.io_err(), 103);
    assert_eq!(env.emu.memory().free_bytes(), baseline);
    assert_eq!(env.dos.process_count(), 0);
    assert_eq!(env.emu.ready_len(), 0);
}

#[test]
fn exit_path_returns_everything_the_process_owned() {
    let env = env(&[]);
    // Create the task array first; it persists by design and would
    // otherwise skew the leak check.
    let probe = env.dos.allocate_cli_number(0xAB);
    env.dos.free_cli_number(probe);
    let baseline = env.emu.memory().free_bytes();

    let parent_lock = env.fs.new_lock();
    let mut cfg = SpawnConfig::new("shell");
    cfg.entry = Some(0x2000);
    cfg.args = "startup-sequence";
    cfg.cli = Some(CliSpec::default());
    cfg.current_dir = env.fs.dup_lock(parent_lock);

    let endpoint = env.dos.spawn(&cfg).unwrap();
    let number = env.dos.with_process(endpoint, |p| p.task_number).unwrap();
    assert!(env.emu.memory().free_bytes() < baseline);

    env.dos.exit_process(endpoint);
    assert_eq!(env.emu.memory().free_bytes(), baseline);
    assert_eq!(env.dos.find_cli(number), 0, "task slot returned");
    assert_eq!(env.dos.process_count(), 0);
    assert_eq!(env.fs.live_locks(), 1, "only the parent's lock remains");
}

#[test]
fn exit_for_an_unknown_endpoint_is_ignored() {
    let env = env(&[]);
    env.dos.exit_process(0xDEAD_0000);
    assert_eq!(env.dos.process_count(), 0);
}
