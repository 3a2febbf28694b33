use std::{
    cell::{Cell, RefCell},
    rc::Rc,
    time::Duration,
};

use tether_client::{ClientConfig, FunctionOptions as ClientFunctionOptions};
use tether_server::FunctionOptions;
use tether_shared::{CommError, ObserverId, Pipeline, RemoteId, RemoteKind, Step};
use tether_test::TestHarness;

fn recorder<T: 'static>() -> (Rc<RefCell<Vec<T>>>, impl Fn(T) + 'static) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let log_clone = log.clone();
    (log, move |value: T| log_clone.borrow_mut().push(value))
}

fn init_logger() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init()
        .ok();
}

#[test]
fn echo_round_trip() {
    init_logger();
    let harness = TestHarness::new();
    let comm = harness.server_comm("Util");
    comm.bind_function("Echo", |_, text: String| Ok::<_, String>(text))
        .unwrap();

    let client = harness.connect_client();
    let echo = harness
        .block_on(client.comm("Util").get_function::<String, String>("Echo"))
        .unwrap();

    let blocking = harness.block_on(echo.invoke("hi".to_string()));
    assert_eq!(blocking, Ok("hi".to_string()));

    let promise = echo.invoke_async("hi".to_string());
    assert_eq!(harness.block_on(promise), Ok("hi".to_string()));
}

#[test]
fn handler_sees_calling_observer() {
    init_logger();
    let harness = TestHarness::new();
    let comm = harness.server_comm("Util");
    comm.bind_function("WhoAmI", |observer: ObserverId, (): ()| {
        Ok::<_, String>(observer.to_u64())
    })
    .unwrap();

    let first = harness.connect_client();
    let second = harness.connect_client();
    let first_function = harness
        .block_on(first.comm("Util").get_function::<(), u64>("WhoAmI"))
        .unwrap();
    let second_function = harness
        .block_on(second.comm("Util").get_function::<(), u64>("WhoAmI"))
        .unwrap();

    assert_eq!(
        harness.block_on(first_function.invoke(())),
        Ok(first.observer.to_u64())
    );
    assert_eq!(
        harness.block_on(second_function.invoke(())),
        Ok(second.observer.to_u64())
    );
}

#[test]
fn concurrent_calls_resolve_independently() {
    init_logger();
    let harness = TestHarness::new();
    let comm = harness.server_comm("Math");
    comm.bind_function("Square", |_, value: i64| Ok::<_, String>(value * value))
        .unwrap();

    let client = harness.connect_client();
    let square = harness
        .block_on(client.comm("Math").get_function::<i64, i64>("Square"))
        .unwrap();

    let promises: Vec<_> = (1..=5).map(|value| square.invoke_async(value)).collect();
    let results = harness.block_on(async move {
        let mut results = Vec::new();
        for promise in promises {
            results.push(promise.await);
        }
        results
    });

    assert_eq!(results, vec![Ok(1), Ok(4), Ok(9), Ok(16), Ok(25)]);
}

#[test]
fn handler_error_becomes_remote_call_failed() {
    init_logger();
    let harness = TestHarness::new();
    let comm = harness.server_comm("Math");
    comm.bind_function("Divide", |_, (a, b): (i32, i32)| {
        if b == 0 {
            Err("division by zero")
        } else {
            Ok(a / b)
        }
    })
    .unwrap();

    let client = harness.connect_client();
    let divide = harness
        .block_on(client.comm("Math").get_function::<(i32, i32), i32>("Divide"))
        .unwrap();

    assert_eq!(harness.block_on(divide.invoke((6, 3))), Ok(2));
    assert_eq!(
        harness.block_on(divide.invoke((1, 0))),
        Err(CommError::RemoteCallFailed {
            remote: RemoteId::new("Math", RemoteKind::Call, "Divide"),
            reason: "division by zero".to_string(),
        })
    );

    // the channel keeps working after a failed call
    assert_eq!(harness.block_on(divide.invoke((9, 3))), Ok(3));
}

#[test]
fn handler_panic_becomes_remote_call_failed() {
    init_logger();
    let harness = TestHarness::new();
    let comm = harness.server_comm("Math");
    comm.bind_function("Explode", |_, (): ()| -> Result<(), String> { panic!("boom") })
        .unwrap();

    let client = harness.connect_client();
    let explode = harness
        .block_on(client.comm("Math").get_function::<(), ()>("Explode"))
        .unwrap();

    match harness.block_on(explode.invoke(())) {
        Err(CommError::RemoteCallFailed { reason, .. }) => assert!(reason.contains("boom")),
        other => panic!("expected RemoteCallFailed, got {:?}", other),
    }
}

#[test]
fn server_inbound_halt_skips_handler_and_outbound() {
    init_logger();
    let harness = TestHarness::new();
    let handler_calls = Rc::new(Cell::new(0));
    let handler_calls_clone = handler_calls.clone();
    let comm = harness.server_comm("Admin");
    comm.bind_function_with(
        "Kick",
        move |_, target: String| {
            handler_calls_clone.set(handler_calls_clone.get() + 1);
            Ok::<_, String>(format!("kicked {}", target))
        },
        FunctionOptions {
            inbound: Pipeline::<String, String>::new().with(|_, target| {
                if target == "admin" {
                    Step::Halt("denied".to_string())
                } else {
                    Step::Continue(target)
                }
            }),
            outbound: Pipeline::<String>::new().with(|_, response| {
                Step::Continue(response.to_uppercase())
            }),
        },
    )
    .unwrap();

    let client = harness.connect_client();
    let kick = harness
        .block_on(client.comm("Admin").get_function::<String, String>("Kick"))
        .unwrap();

    assert_eq!(
        harness.block_on(kick.invoke("admin".to_string())),
        Ok("denied".to_string())
    );
    assert_eq!(handler_calls.get(), 0);

    assert_eq!(
        harness.block_on(kick.invoke("bob".to_string())),
        Ok("KICKED BOB".to_string())
    );
    assert_eq!(handler_calls.get(), 1);
}

#[test]
fn client_outbound_halt_sends_halted_args() {
    init_logger();
    let harness = TestHarness::new();
    let received = Rc::new(RefCell::new(Vec::new()));
    let received_clone = received.clone();
    let comm = harness.server_comm("Math");
    comm.bind_function("Add", move |_, (a, b): (i32, i32)| {
        received_clone.borrow_mut().push((a, b));
        Ok::<_, String>(a + b)
    })
    .unwrap();

    let client = harness.connect_client();
    let add = harness
        .block_on(client.comm("Math").get_function_with(
            "Add",
            ClientFunctionOptions {
                outbound: Pipeline::<(i32, i32)>::new()
                    .with(|_, (a, b)| {
                        if a == 0 && b == 0 {
                            Step::Halt((40, 2))
                        } else {
                            Step::Continue((a, b))
                        }
                    })
                    .with(|_, _| -> Step<(i32, i32)> { panic!("runs after a halt") }),
                inbound: Pipeline::<i32>::new().with(|_, sum| Step::Halt(sum * 10)),
            },
        ))
        .unwrap();

    // the halted value is what goes over the wire
    assert_eq!(harness.block_on(add.invoke((0, 0))), Ok(420));
    assert_eq!(*received.borrow(), vec![(40, 2)]);
}

#[test]
fn client_outbound_rewrites_request() {
    init_logger();
    let harness = TestHarness::new();
    let comm = harness.server_comm("Util");
    comm.bind_function("Echo", |_, value: i32| Ok::<_, String>(value))
        .unwrap();

    let client = harness.connect_client();
    let echo = harness
        .block_on(client.comm("Util").get_function_with(
            "Echo",
            ClientFunctionOptions {
                outbound: Pipeline::<i32>::new().with(|_, value| Step::Continue(value + 1)),
                inbound: Pipeline::<i32>::new(),
            },
        ))
        .unwrap();

    assert_eq!(harness.block_on(echo.invoke(1)), Ok(2));
}

#[test]
fn server_middleware_panic_fails_only_that_call() {
    init_logger();
    let harness = TestHarness::new();
    let comm = harness.server_comm("Util");
    comm.bind_function_with(
        "Checked",
        |_, value: i32| Ok::<_, String>(value),
        FunctionOptions {
            inbound: Pipeline::<i32, i32>::new().with(|_, value| {
                if value < 0 {
                    panic!("negative input");
                }
                Step::Continue(value)
            }),
            outbound: Pipeline::<i32>::new().with(|_, value| {
                if value == 13 {
                    panic!("unlucky output");
                }
                Step::Continue(value)
            }),
        },
    )
    .unwrap();
    let ping = comm.create_signal::<u32>("Ping").unwrap();
    let (pings, record) = recorder::<u32>();
    ping.connect(move |_, value| record(value));

    let client = harness.connect_client();
    let client_comm = client.comm("Util");
    let checked = harness
        .block_on(client_comm.get_function::<i32, i32>("Checked"))
        .unwrap();
    let client_ping = harness
        .block_on(client_comm.get_signal::<u32>("Ping"))
        .unwrap();

    match harness.block_on(checked.invoke(-1)) {
        Err(CommError::RemoteCallFailed { reason, .. }) => {
            assert!(reason.contains("negative input"))
        }
        other => panic!("expected RemoteCallFailed, got {:?}", other),
    }
    match harness.block_on(checked.invoke(13)) {
        Err(CommError::RemoteCallFailed { reason, .. }) => {
            assert!(reason.contains("unlucky output"))
        }
        other => panic!("expected RemoteCallFailed, got {:?}", other),
    }

    // the server keeps servicing every channel
    client_ping.fire(7);
    harness.flush();
    assert_eq!(*pings.borrow(), vec![7]);
    assert_eq!(harness.block_on(checked.invoke(5)), Ok(5));
}

#[test]
fn client_middleware_panic_rejects_the_call() {
    init_logger();
    let harness = TestHarness::new();
    let comm = harness.server_comm("Util");
    comm.bind_function("Echo", |_, value: i32| Ok::<_, String>(value))
        .unwrap();

    let client = harness.connect_client();
    let echo = harness
        .block_on(client.comm("Util").get_function_with(
            "Echo",
            ClientFunctionOptions {
                outbound: Pipeline::<i32>::new().with(|_, value| {
                    if value < 0 {
                        panic!("bad request");
                    }
                    Step::Continue(value)
                }),
                inbound: Pipeline::<i32>::new().with(|_, value| {
                    if value == 0 {
                        panic!("bad response");
                    }
                    Step::Continue(value)
                }),
            },
        ))
        .unwrap();

    match harness.block_on(echo.invoke_async(-1)) {
        Err(CommError::RemoteCallFailed { reason, .. }) => assert!(reason.contains("bad request")),
        other => panic!("expected RemoteCallFailed, got {:?}", other),
    }
    match harness.block_on(echo.invoke_async(0)) {
        Err(CommError::RemoteCallFailed { reason, .. }) => {
            assert!(reason.contains("bad response"))
        }
        other => panic!("expected RemoteCallFailed, got {:?}", other),
    }
    assert_eq!(harness.block_on(echo.invoke(3)), Ok(3));
}

#[test]
fn unknown_function_is_not_found_after_discovery_timeout() {
    init_logger();
    let harness = TestHarness::new();
    let _comm = harness.server_comm("Util");

    let client = harness.connect_client_with(ClientConfig {
        discovery_timeout: Duration::from_millis(50),
        ..ClientConfig::default()
    });

    let result = harness.block_on(client.comm("Util").get_function::<(), ()>("Missing"));
    assert_eq!(
        result.err(),
        Some(CommError::NotFound {
            remote: RemoteId::new("Util", RemoteKind::Call, "Missing"),
            waited: Duration::from_millis(50),
        })
    );
}

#[test]
fn lookup_waits_for_late_announcement() {
    init_logger();
    let harness = TestHarness::new();
    let comm = Rc::new(harness.server_comm("Util"));
    let client = harness.connect_client();

    let late_comm = comm.clone();
    harness.scheduler.defer(move || {
        late_comm
            .bind_function("Late", |_, value: u8| Ok::<_, String>(value + 1))
            .unwrap();
    });

    let late = harness
        .block_on(client.comm("Util").get_function::<u8, u8>("Late"))
        .unwrap();
    assert_eq!(harness.block_on(late.invoke(1)), Ok(2));
}

#[test]
fn cancelling_one_call_leaves_others_alone() {
    init_logger();
    let harness = TestHarness::new();
    let comm = harness.server_comm("Util");
    comm.bind_function("Echo", |_, value: u32| Ok::<_, String>(value))
        .unwrap();

    let client = harness.connect_client();
    let echo = harness
        .block_on(client.comm("Util").get_function::<u32, u32>("Echo"))
        .unwrap();

    let mut cancelled = echo.invoke_async(1);
    let kept = echo.invoke_async(2);
    cancelled.cancel();
    assert!(cancelled.is_cancelled());

    assert_eq!(harness.block_on(cancelled), Err(CommError::Cancelled));
    assert_eq!(harness.block_on(kept), Ok(2));
}

#[test]
fn call_timeout_rejects_with_timeout() {
    init_logger();
    let harness = TestHarness::new();
    let comm = harness.server_comm("Util");
    comm.bind_function("Echo", |_, value: u32| Ok::<_, String>(value))
        .unwrap();

    let client = harness.connect_client_with(ClientConfig {
        call_timeout: Some(Duration::from_millis(50)),
        ..ClientConfig::default()
    });
    let echo = harness
        .block_on(client.comm("Util").get_function::<u32, u32>("Echo"))
        .unwrap();

    // the server stops answering, the client stays connected
    harness.server.shutdown();

    assert_eq!(
        harness.block_on(echo.invoke(7)),
        Err(CommError::Timeout {
            after: Duration::from_millis(50)
        })
    );
}

#[test]
fn disconnect_fails_outstanding_calls() {
    init_logger();
    let harness = TestHarness::new();
    let comm = harness.server_comm("Util");
    comm.bind_function("Echo", |_, value: u32| Ok::<_, String>(value))
        .unwrap();

    let client = harness.connect_client();
    let echo = harness
        .block_on(client.comm("Util").get_function::<u32, u32>("Echo"))
        .unwrap();
    let disconnects = Rc::new(RefCell::new(0));
    let disconnects_clone = disconnects.clone();
    client
        .client
        .disconnected()
        .connect(move |_| *disconnects_clone.borrow_mut() += 1);

    harness.server.shutdown();
    let pending = echo.invoke_async(1);
    client.disconnect();

    assert_eq!(harness.block_on(pending), Err(CommError::Disconnected));
    assert_eq!(*disconnects.borrow(), 1);
    assert!(!client.is_connected());

    // calls made after the disconnect fail right away
    assert_eq!(
        harness.block_on(echo.invoke(2)),
        Err(CommError::Disconnected)
    );
}

#[test]
fn destroyed_function_fails_later_calls() {
    init_logger();
    let harness = TestHarness::new();
    let comm = harness.server_comm("Util");
    let function = comm
        .bind_function("Echo", |_, value: u32| Ok::<_, String>(value))
        .unwrap();

    let client = harness.connect_client();
    let echo = harness
        .block_on(client.comm("Util").get_function::<u32, u32>("Echo"))
        .unwrap();

    function.destroy();
    harness.flush();

    assert!(matches!(
        harness.block_on(echo.invoke(1)),
        Err(CommError::RemoteCallFailed { .. })
    ));
}
