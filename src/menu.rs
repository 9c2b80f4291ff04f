use std::io::{self, BufRead, Write};

pub const EXIT_CHOICE: u32 = 5;

pub fn show_menu() {
    println!("\n===========================================");
    println!("G-Force Monitor");
    println!("===========================================");
    println!("Select an option:");
    println!("1. Run Monitor (paced loop)");
    println!("2. Run Monitor (async host)");
    println!("3. List Ride Modes");
    println!("4. Lamp Test");
    println!("5. Exit");
    println!("===========================================");
    print!("Choice (1-5): ");
    let _ = io::stdout().flush();
}

pub fn get_user_choice() -> Result<u32, std::num::ParseIntError> {
    read_choice(&mut io::stdin().lock())
}

/// A closed or unreadable input counts as choosing Exit.
fn read_choice(reader: &mut impl BufRead) -> Result<u32, std::num::ParseIntError> {
    let mut input = String::new();
    match reader.read_line(&mut input) {
        Ok(0) | Err(_) => Ok(EXIT_CHOICE),
        Ok(_) => input.trim().parse::<u32>(),
    }
}

pub fn wait_for_enter() {
    println!("\nPress Enter to return to menu...");
    let mut input = String::new();
    let _ = io::stdin().read_line(&mut input);
}
