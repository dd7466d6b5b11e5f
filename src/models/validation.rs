use anyhow::{Result, anyhow};

pub fn validate_email_address(address: &str) -> Result<()> {
    if address.is_empty() {
        return Err(anyhow!("Recipient address cannot be empty"));
    }

    if address.len() > 254 {
        return Err(anyhow!("Recipient address too long (maximum 254 characters)"));
    }

    if address.chars().any(char::is_whitespace) {
        return Err(anyhow!("Recipient address contains whitespace"));
    }

    let mut parts = address.split('@');
    let local = parts.next().unwrap_or("");
    let domain = parts.next().unwrap_or("");

    if local.is_empty() || domain.is_empty() || parts.next().is_some() {
        return Err(anyhow!("Recipient address must contain exactly one '@'"));
    }

    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err(anyhow!("Recipient address has an invalid domain"));
    }

    Ok(())
}
