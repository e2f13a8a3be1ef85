use sovran_keystore::{StoreError, SweepConfig, TypeStore, TypeStoreV};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), StoreError> {
    let store = TypeStore::<i32>::new();

    println!("{} {}", store.has::<String>(&1), store.has_raw(&1));
    println!("{:?}", store.get::<String>(&1));

    store.set(1, "hmm".to_string());
    println!(
        "{} {} {}",
        store.has_raw(&1),
        store.has::<String>(&1),
        store.has::<i32>(&1)
    );
    println!("{:?}", store.get::<String>(&1));
    println!("{:?}", store.get::<f64>(&1));

    store.set(1, 5.2f64);
    println!("{:?}", store.get::<f64>(&1));
    println!("{}", store.has::<f64>(&1));

    if let Some(raw) = store.get_raw(&1) {
        println!("{:?} ({:?})", raw.downcast_ref::<f64>(), store.type_name(&1));
    }

    println!("====");

    store.set(2, 2i32);
    store.set(3, 3i32);
    println!("{:?} {}", store.keys(), store.values().len());
    println!("{:?} {:?}", store.keys_of::<i32>(), store.values_of::<i32>());

    println!("==== ttl");

    let sessions = TypeStoreV::<&str, u64>::new();
    let sweep = sessions.expire_sweep_with(
        SweepConfig::every(Duration::from_millis(10)),
        |id, user| println!("session {id} of user {user} expired"),
    )?;

    sessions.set("admin", 1);
    sessions.set_with_ttl("guest", 42, Duration::from_millis(50));
    println!("{:?} left for guest", sessions.ttl(&"guest"));

    tokio::time::sleep(Duration::from_millis(100)).await;
    println!("remaining: {:?}", sessions.keys());

    sweep.stop().await;
    Ok(())
}
