//! Programmer registration and dispatch
//!
//! Every programmer is opened as a boxed [`IspMaster`] so the command
//! sequencing never needs to know which one it is driving.

use hidisp_core::programmer::IspMaster;

/// Information about a programmer
pub struct ProgrammerInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Get information about all available programmers (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_programmers() -> Vec<ProgrammerInfo> {
    let mut programmers = Vec::new();

    #[cfg(feature = "hidboot")]
    programmers.push(ProgrammerInfo {
        name: "hidboot",
        aliases: &["hid"],
        description: "HIDBoot USB ISP bridge (VID:16c0 PID:05df)",
    });

    #[cfg(feature = "dummy")]
    programmers.push(ProgrammerInfo {
        name: "dummy",
        aliases: &[],
        description: "Simulated ATmega8 target for dry runs",
    });

    programmers
}

/// Generate a short list of programmer names for CLI help
pub fn programmer_names_short() -> String {
    let programmers = available_programmers();
    let names: Vec<&str> = programmers.iter().map(|p| p.name).collect();
    names.join(", ")
}

/// Resolve a name or alias to the primary programmer name
pub fn find_programmer(name: &str) -> Option<&'static str> {
    available_programmers()
        .into_iter()
        .find(|p| p.name == name || p.aliases.iter().any(|a| *a == name))
        .map(|p| p.name)
}

/// Open a programmer by name
pub fn open_programmer(name: &str) -> Result<Box<dyn IspMaster>, Box<dyn std::error::Error>> {
    let Some(primary) = find_programmer(name) else {
        let mut msg = format!("Unknown programmer: {}\nAvailable programmers:", name);
        for p in available_programmers() {
            msg.push_str(&format!("\n  {:10} - {}", p.name, p.description));
        }
        return Err(msg.into());
    };

    match primary {
        #[cfg(feature = "hidboot")]
        "hidboot" => {
            let transport = hidisp_hid::UsbHidTransport::open_hidboot()?;
            Ok(Box::new(hidisp_hid::HidIsp::new(transport)))
        }
        #[cfg(feature = "dummy")]
        "dummy" => {
            log::info!("Using simulated target");
            Ok(Box::new(hidisp_dummy::DummyAvr::new_default()))
        }
        _ => Err(format!("Programmer {} is not enabled in this build", primary).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_programmer() {
        #[cfg(feature = "hidboot")]
        assert_eq!(find_programmer("hid"), Some("hidboot"));
        #[cfg(feature = "dummy")]
        assert_eq!(find_programmer("dummy"), Some("dummy"));
        assert_eq!(find_programmer("ch341a"), None);
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_open_dummy() {
        assert!(open_programmer("dummy").is_ok());
        assert!(open_programmer("nope").is_err());
    }
}
