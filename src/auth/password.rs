use crate::Result;

/// bcrypt hash with a random salt
pub fn hash_password(password: &str, cost: u32) -> Result<String> {
    Ok(bcrypt::hash(password, cost)?)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    Ok(bcrypt::verify(password, hash)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash() -> anyhow::Result<()> {
        let h1 = hash_password("secret1", 4)?;
        let h2 = hash_password("secret1", 4)?;
        assert_ne!(h1, h2);
        assert_ne!(h1, "secret1");
        assert!(verify_password("secret1", &h1)?);
        assert!(verify_password("secret1", &h2)?);
        assert!(!verify_password("secret2", &h1)?);
        Ok(())
    }
}
