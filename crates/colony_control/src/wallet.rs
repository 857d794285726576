use colony_core::{Token, TokenWallet};

/// Finite token supply. Tokens must be requested before they can be spent,
/// and each one spends at most once.
#[derive(Debug, Clone, Default)]
pub struct CountingWallet {
    balance: u32,
    serial: u64,
    outstanding: Vec<String>,
}

impl CountingWallet {
    pub fn new(balance: u32) -> Self {
        Self {
            balance,
            ..Self::default()
        }
    }

    pub fn balance(&self) -> u32 {
        self.balance
    }
}

impl TokenWallet for CountingWallet {
    fn request_token(&mut self) -> Option<Token> {
        let issued = u32::try_from(self.outstanding.len()).unwrap_or(u32::MAX);
        if issued >= self.balance {
            return None;
        }
        let token = format!("token_{:04}", self.serial);
        self.serial += 1;
        self.outstanding.push(token.clone());
        Some(Token(token))
    }

    fn spend_token(&mut self, token: Token) -> bool {
        let Some(idx) = self.outstanding.iter().position(|t| *t == token.0) else {
            return false;
        };
        self.outstanding.swap_remove(idx);
        self.balance -= 1;
        true
    }

    fn release_token(&mut self, token: Token) {
        self.outstanding.retain(|t| *t != token.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_spend_once() {
        let mut wallet = CountingWallet::new(1);
        let token = wallet.request_token().unwrap();
        assert!(wallet.request_token().is_none());
        assert!(wallet.spend_token(token.clone()));
        assert!(!wallet.spend_token(token));
        assert_eq!(wallet.balance(), 0);
    }

    #[test]
    fn released_tokens_can_be_requested_again() {
        let mut wallet = CountingWallet::new(1);
        let token = wallet.request_token().unwrap();
        wallet.release_token(token.clone());

        assert!(!wallet.spend_token(token));
        let again = wallet.request_token().unwrap();
        assert!(wallet.spend_token(again));
        assert_eq!(wallet.balance(), 0);
    }

    #[test]
    fn forged_tokens_are_refused() {
        let mut wallet = CountingWallet::new(3);
        assert!(!wallet.spend_token(Token("token_9999".to_string())));
        assert_eq!(wallet.balance(), 3);
    }
}
