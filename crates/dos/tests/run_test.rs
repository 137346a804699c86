mod common;

use std::cell::Cell;
use std::rc::Rc;

use common::{env, trivial_image, Env};
use dos::FileHandle;
use types::{COMMAND_NOT_LOADED, RETURN_OK};

/// Creates the task array up front (it persists by design) and returns
/// the free-store baseline every complete run must restore.
fn settle_baseline(env: &Env) -> u32 {
    let probe = env.dos.allocate_cli_number(0xAB);
    env.dos.free_cli_number(probe);
    env.emu.memory().free_bytes()
}

/// Installs the minimal cooperative scheduler: starting with the
/// `delay`-th yield, each pass runs one ready process to completion.
fn schedule_exits_after(env: &Env, delay: u32) -> Rc<Cell<u32>> {
    let yields = Rc::new(Cell::new(0u32));
    let seen = yields.clone();
    let dos = env.dos.clone();
    let emu = env.emu.clone();
    env.emu.set_scheduler(Box::new(move || {
        seen.set(seen.get() + 1);
        if seen.get() >= delay {
            if let Some(endpoint) = emu.take_ready() {
                dos.exit_process(endpoint);
            }
        }
    }));
    yields
}

#[test]
fn missing_binary_reports_not_loaded_without_side_effects() {
    let env = env(&[]);
    let baseline = env.emu.memory().free_bytes();

    let rc = env
        .dos
        .run_command("nosuch", FileHandle::NIL, FileHandle::NIL, false);
    assert_eq!(rc, COMMAND_NOT_LOADED);
    assert_eq!(env.dos.io_err(), 205);
    assert_eq!(env.dos.process_count(), 0);
    assert_eq!(env.emu.ready_len(), 0);
    assert_eq!(env.dos.max_cli(), 0, "no task-array entry was made");
    assert_eq!(env.emu.memory().free_bytes(), baseline);
}

#[test]
fn empty_command_line_reports_not_loaded() {
    let env = env(&[]);
    let rc = env
        .dos
        .run_command("   ", FileHandle::NIL, FileHandle::NIL, false);
    assert_eq!(rc, COMMAND_NOT_LOADED);
}

#[test]
fn synchronous_run_blocks_until_the_child_exits() {
    let env = env(&[("tool", trivial_image())]);
    let baseline = settle_baseline(&env);
    let yields = schedule_exits_after(&env, 3);

    let rc = env
        .dos
        .run_command("tool with args", FileHandle::NIL, FileHandle::NIL, false);
    assert_eq!(rc, RETURN_OK);
    assert!(yields.get() >= 3, "the coordinator yielded while polling");
    assert_eq!(env.dos.process_count(), 0);
    // Child teardown plus the coordinator's unload released everything.
    assert_eq!(env.emu.memory().free_bytes(), baseline);
    assert!(env.emu.interrupts_enabled());
}

#[test]
fn asynchronous_run_returns_immediately_and_hands_off_the_seglist() {
    let env = env(&[("tool", trivial_image())]);
    let baseline = settle_baseline(&env);

    let rc = env
        .dos
        .run_command("tool", FileHandle::NIL, FileHandle::NIL, true);
    assert_eq!(rc, RETURN_OK);
    assert_eq!(env.dos.process_count(), 1, "child still running");

    // The child owns the load image now; its exit releases it.
    let endpoint = env.emu.take_ready().unwrap();
    env.dos.exit_process(endpoint);
    assert_eq!(env.emu.memory().free_bytes(), baseline);
}

#[test]
fn bare_names_fall_back_to_the_system_binary_directory() {
    let env = env(&[("C:list", trivial_image())]);
    settle_baseline(&env);
    schedule_exits_after(&env, 1);

    let rc = env
        .dos
        .run_command("list", FileHandle::NIL, FileHandle::NIL, false);
    assert_eq!(rc, RETURN_OK);
}

#[test]
fn qualified_names_do_not_fall_back() {
    // The file exists under the fallback prefix, but a qualified name
    // must be taken verbatim.
    let env = env(&[("C:work/tool", trivial_image())]);
    let rc = env
        .dos
        .run_command("work/tool", FileHandle::NIL, FileHandle::NIL, false);
    assert_eq!(rc, COMMAND_NOT_LOADED);
}

#[test]
fn recycled_task_slot_ends_the_wait() {
    let env = env(&[("tool", trivial_image())]);
    settle_baseline(&env);

    // First yield: the child exits and an unrelated process claims its
    // freed number. The captured endpoint no longer matches, which the
    // coordinator must read as "child finished".
    let dos = env.dos.clone();
    let emu = env.emu.clone();
    env.emu.set_scheduler(Box::new(move || {
        if let Some(endpoint) = emu.take_ready() {
            dos.exit_process(endpoint);
            let stolen = dos.allocate_cli_number(0xDEAD_BEE0);
            assert_ne!(stolen, 0);
        }
    }));

    let rc = env
        .dos
        .run_command("tool", FileHandle::NIL, FileHandle::NIL, false);
    assert_eq!(rc, RETURN_OK);
    assert_eq!(env.dos.process_count(), 0);
}
