// Test that the Drone object can be sent between threads

use std::thread::spawn;

#[tokio::test]
async fn drone_can_be_sent_to_thread() -> Result<(), Box<dyn std::error::Error>> {
    // Bind a local UDP endpoint, no vehicle needs to be around for this.
    let drone = mavgcs::Drone::connect("udpin:127.0.0.1:0").await?;

    let _ = spawn(move || drone).join().unwrap();

    Ok(())
}
