//! The `drillgrade init` command.

use std::path::Path;

use anyhow::{Context, Result};

const REFERENCE_DIR: &str = "reference/2026/2026-10-15";

pub fn execute() -> Result<()> {
    write_if_absent(Path::new("drillgrade.toml"), SAMPLE_CONFIG)?;

    std::fs::create_dir_all(REFERENCE_DIR)
        .with_context(|| format!("failed to create {REFERENCE_DIR}"))?;
    write_if_absent(
        &Path::new(REFERENCE_DIR).join("2026-10-15-reference.json"),
        SAMPLE_REFERENCE,
    )?;
    write_if_absent(
        &Path::new(REFERENCE_DIR).join("2026-10-15-instructions.txt"),
        SAMPLE_INSTRUCTIONS,
    )?;
    write_if_absent(Path::new("messages.json"), SAMPLE_MESSAGES)?;

    println!("\nNext steps:");
    println!("  1. Edit drillgrade.toml for your exercise date and store");
    println!("  2. Run: drillgrade validate");
    println!("  3. Run: drillgrade grade");
    println!("  4. Run: drillgrade history");

    Ok(())
}

fn write_if_absent(path: &Path, content: &str) -> Result<()> {
    let name = path.display();
    if path.exists() {
        println!("{name} already exists, skipping.");
    } else {
        std::fs::write(path, content).with_context(|| format!("failed to write {name}"))?;
        println!("Created {name}");
    }
    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# drillgrade configuration

[exercise]
# yyyy-mm-dd, or one of today, last, next
date = "2026-10-15"
kind = "Practice"
name = "Sample ICS-213 exercise"

[paths]
reference_root = "reference"
messages = "messages.json"
output_dir = "drillgrade-output"

[classification]
location_policy = "last_wins"

[scoring]
required_address = "ETO-PRACTICE@winlink.org"

[location]
jitter = true
radius_meters = 10000.0
seed = 0

[outbound]
enabled = true
sender = "ETO-PRACTICE"
subject = "ETO Practice Exercise Feedback"

[persistence]
miss_limit = 3

[persistence.backend]
type = "sqlite"
path = "drillgrade.db"
"#;

const SAMPLE_REFERENCE: &str = r#"{
  "message_id": "REF-0001",
  "from": "ETO-PRACTICE",
  "to": ["ETO-PRACTICE@winlink.org"],
  "subject": "ETO Practice ICS-213",
  "msg_date_time": "2026-10-09T09:00:00",
  "plain_content": "Practice message for 2026-10-15\nExercise Id: ab12cd34ef56\n",
  "form": {
    "form_type": "ics_213",
    "organization": "EOC",
    "incident_name": "Cascadia Quake",
    "form_to": "Planning",
    "form_from": "Field",
    "form_subject": "Shelter status",
    "form_date": "2026-10-14",
    "form_time": "10:00",
    "form_message": "Shelter open with capacity for 40",
    "approved_by": "",
    "position": "Radio Operator",
    "is_exercise": true
  }
}
"#;

const SAMPLE_INSTRUCTIONS: &str = "\
Next week: send an ICS-213 to ETO-PRACTICE@winlink.org reporting shelter status.
";

const SAMPLE_MESSAGES: &str = r#"[
  {
    "message_id": "KM6SO-0001",
    "from": "KM6SO",
    "to": ["ETO-PRACTICE@winlink.org"],
    "subject": "ETO Practice ICS-213 from KM6SO",
    "msg_date_time": "2026-10-14T12:00:00",
    "map_location": { "latitude": 47.61, "longitude": -122.33 },
    "msg_location": { "latitude": 47.61, "longitude": -122.33 },
    "plain_content": "Exercise Id: ab12cd34ef56\n",
    "form": {
      "form_type": "ics_213",
      "organization": "EOC",
      "incident_name": "Cascadia Quake",
      "form_to": "Planning",
      "form_from": "Field",
      "form_subject": "Shelter status",
      "form_date": "2026-10-14",
      "form_time": "10:00",
      "form_message": "Shelter open with capacity for 40",
      "approved_by": "",
      "position": "Radio Operator",
      "is_exercise": true,
      "form_location": { "latitude": 47.61, "longitude": -122.33 }
    }
  },
  {
    "message_id": "W7ABC-0001",
    "from": "W7ABC",
    "to": ["ETO-PRACTICE@winlink.org"],
    "subject": "ETO Practice ICS-213",
    "msg_date_time": "2026-10-14T18:30:00",
    "msg_location": { "latitude": 45.52, "longitude": -122.68 },
    "plain_content": "Exercise Id: ab12cd34ef56\n",
    "form": {
      "form_type": "ics_213",
      "organization": "Red Cross",
      "incident_name": "Cascadia Quake",
      "form_to": "Planning",
      "form_from": "Field",
      "form_subject": "Shelter status",
      "form_date": "2026-10-14",
      "form_time": "18:00",
      "form_message": "Shelter open with capacity for 40",
      "approved_by": "",
      "position": "Radio Operator",
      "is_exercise": true,
      "form_location": { "latitude": 45.52, "longitude": -122.68 }
    }
  },
  {
    "message_id": "N0CALL-0001",
    "from": "N0CALL",
    "to": ["ETO-PRACTICE@winlink.org"],
    "subject": "Checking in",
    "msg_date_time": "2026-10-13T08:15:00",
    "map_location": { "latitude": 39.74, "longitude": -104.99 },
    "plain_content": "Checking in for the practice net.\n"
  }
]
"#;
