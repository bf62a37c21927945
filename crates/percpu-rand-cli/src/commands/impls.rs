use percpu_rand_core::{Result, Selection, registry};

pub fn run() -> Result<()> {
    let reg = registry();
    let names = reg.names();
    let fastest = reg.fastest().name();
    let selection = reg.selection();

    println!("Found {} supported keyed-hash variant(s):\n", names.len());
    for (id, name) in names.iter().enumerate() {
        let mut tags = Vec::new();
        if selection == Selection::Fixed(id) {
            tags.push("selected");
        }
        if *name == fastest {
            tags.push("fastest");
        }
        let tags = if tags.is_empty() {
            String::new()
        } else {
            format!("  [{}]", tags.join(", "))
        };
        println!("  {id:>2}  {name:<12}{tags}");
    }

    if names.is_empty() {
        println!("  (none supported)");
    }
    println!("\nSelection: {}", reg.current_name());
    Ok(())
}
