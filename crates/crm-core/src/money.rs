//! Currency codes. AUD is the base currency: base-currency amounts
//! (`audValue`, `audSubscription`) mirror the raw amount when the record is
//! denominated in AUD.

use crate::choice::choice_enum;

choice_enum! {
    /// ISO 4217 codes accepted on leads and chargeables.
    pub enum CurrencyCode (default Aud) {
        /// Australian dollar (base).
        Aud => "AUD",
        /// US dollar.
        Usd => "USD",
        /// Euro.
        Eur => "EUR",
        /// Pound sterling.
        Gbp => "GBP",
        /// Japanese yen.
        Jpy => "JPY",
        /// Canadian dollar.
        Cad => "CAD",
        /// Chinese yuan.
        Cny => "CNY",
        /// Indian rupee.
        Inr => "INR",
        /// New Zealand dollar.
        Nzd => "NZD",
    }
}

impl CurrencyCode {
    /// Whether this is the base currency.
    pub fn is_base(&self) -> bool {
        matches!(self, Self::Aud)
    }
}
