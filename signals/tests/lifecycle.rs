// ============================================================================
// cinder-signals - Lifecycle Integration Tests
// Subscription lifetime across writes, nesting, and scope disposal
// ============================================================================

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use cinder_signals::{derived, effect, state, Scope, Store};

#[test]
fn every_reader_runs_once_per_write_in_registration_order() {
    let cell = state(0);
    let log = Rc::new(RefCell::new(Vec::new()));

    let mut disposers = Vec::new();
    for label in ["first", "second", "third"] {
        let cell = cell.clone();
        let log = log.clone();
        disposers.push(effect(move || {
            let _ = cell.get();
            log.borrow_mut().push(label);
        }));
    }

    log.borrow_mut().clear();

    for _ in 0..3 {
        cell.set(1);
    }

    // Three writes, three full passes, registration order each time. The
    // value never changed; writes are equality-free.
    assert_eq!(
        *log.borrow(),
        vec![
            "first", "second", "third", "first", "second", "third", "first", "second", "third"
        ]
    );

    for dispose in disposers {
        dispose();
    }
}

#[test]
fn flush_completes_before_set_returns() {
    let cell = state(0);
    let observed_during_write = Rc::new(Cell::new(0));

    let _dispose = effect({
        let cell = cell.clone();
        let observed = observed_during_write.clone();
        move || observed.set(cell.get())
    });

    cell.set(10);
    assert_eq!(observed_during_write.get(), 10);
}

#[test]
fn scope_disposal_leaves_zero_live_subscriptions() {
    let cells = [state(0), state(0), state(0)];
    let runs = Rc::new(Cell::new(0));

    let scope = Scope::new();
    scope.run(|| {
        // Three levels of nesting; every level reads one cell.
        let [a, b, c] = cells.clone();
        let runs_outer = runs.clone();
        let _ = effect(move || {
            let _ = a.get();
            runs_outer.set(runs_outer.get() + 1);

            let b = b.clone();
            let c = c.clone();
            let runs_mid = runs_outer.clone();
            let _ = effect(move || {
                let _ = b.get();
                runs_mid.set(runs_mid.get() + 1);

                let c = c.clone();
                let runs_inner = runs_mid.clone();
                let _ = effect(move || {
                    let _ = c.get();
                    runs_inner.set(runs_inner.get() + 1);
                });
            });
        });
    });

    assert_eq!(runs.get(), 3);

    scope.reset();

    let before = runs.get();
    for cell in &cells {
        cell.set(99);
    }
    assert_eq!(runs.get(), before, "no callback may survive a scope reset");
}

#[test]
fn scope_reset_twice_is_harmless() {
    let cell = state(0);
    let scope = Scope::new();
    scope.run(|| {
        let cell = cell.clone();
        let _ = effect(move || {
            let _ = cell.get();
        });
    });

    scope.reset();
    scope.reset();
    cell.set(1);
}

#[test]
fn derived_does_not_hold_disposed_effects_alive() {
    let base = state(1);
    let doubled = derived({
        let base = base.clone();
        move || base.get() * 2
    });

    let runs = Rc::new(Cell::new(0));
    let scope = Scope::new();
    scope.run(|| {
        let doubled = doubled.clone();
        let runs = runs.clone();
        let _ = effect(move || {
            let _ = doubled.get();
            runs.set(runs.get() + 1);
        });
    });

    assert_eq!(runs.get(), 1);
    scope.reset();

    base.set(5);
    assert_eq!(runs.get(), 1);
    // The derived itself still works after the scope is gone.
    assert_eq!(doubled.get(), 10);
}

#[test]
fn store_subscriptions_die_with_the_scope() {
    let store: Rc<Store<String, String>> = Rc::new(Store::new());
    store.set("user".into(), "ada".into());

    let runs = Rc::new(Cell::new(0));
    let scope = Scope::new();
    scope.run(|| {
        let store = store.clone();
        let runs = runs.clone();
        let _ = effect(move || {
            let _ = store.get(&"user".to_string());
            runs.set(runs.get() + 1);
        });
    });

    store.set("user".into(), "grace".into());
    assert_eq!(runs.get(), 2);

    scope.reset();
    store.set("user".into(), "linus".into());
    assert_eq!(runs.get(), 2);
}

#[test]
fn cleanup_functions_run_on_reset() {
    let order = Rc::new(RefCell::new(Vec::new()));
    let scope = Scope::new();

    {
        let order = order.clone();
        scope.on_cleanup(move || order.borrow_mut().push("cleanup"));
    }
    scope.run(|| {
        let order = order.clone();
        let _ = cinder_signals::effect_with_cleanup(move || {
            let order = order.clone();
            Some(Box::new(move || order.borrow_mut().push("teardown")) as Box<dyn FnOnce()>)
        });
    });

    scope.reset();
    assert_eq!(*order.borrow(), vec!["teardown", "cleanup"]);
}
