/// Columns every transaction export carries, by header name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Date,
    Action,
    Symbol,
    Description,
    Price,
    Quantity,
    Fees,
    Amount,
}

impl Column {
    pub const ALL: [Column; 8] = [
        Column::Date,
        Column::Action,
        Column::Symbol,
        Column::Description,
        Column::Price,
        Column::Quantity,
        Column::Fees,
        Column::Amount,
    ];

    pub fn header(&self) -> &'static str {
        match self {
            Self::Date => "Date",
            Self::Action => "Action",
            Self::Symbol => "Symbol",
            Self::Description => "Description",
            Self::Price => "Price",
            Self::Quantity => "Quantity",
            Self::Fees => "Fees & Comm",
            Self::Amount => "Amount",
        }
    }

    pub fn from_header(name: &str) -> Option<Column> {
        Self::ALL.into_iter().find(|c| c.header() == name)
    }
}

/// One transaction row, fields kept exactly as exported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Transaction {
    pub date: String,
    pub action: String,
    pub symbol: String,
    pub description: String,
    pub price: String,
    pub quantity: String,
    pub fees: String,
    pub amount: String,
}

impl Transaction {
    pub fn get(&self, column: Column) -> &str {
        match column {
            Column::Date => &self.date,
            Column::Action => &self.action,
            Column::Symbol => &self.symbol,
            Column::Description => &self.description,
            Column::Price => &self.price,
            Column::Quantity => &self.quantity,
            Column::Fees => &self.fees,
            Column::Amount => &self.amount,
        }
    }

    pub fn set(&mut self, column: Column, value: String) {
        let field = match column {
            Column::Date => &mut self.date,
            Column::Action => &mut self.action,
            Column::Symbol => &mut self.symbol,
            Column::Description => &mut self.description,
            Column::Price => &mut self.price,
            Column::Quantity => &mut self.quantity,
            Column::Fees => &mut self.fees,
            Column::Amount => &mut self.amount,
        };
        *field = value;
    }

    pub fn with_symbol(&self, symbol: String) -> Self {
        Self {
            symbol,
            ..self.clone()
        }
    }

    pub fn with_amount(&self, amount: String) -> Self {
        Self {
            amount,
            ..self.clone()
        }
    }

    pub fn has_missing_symbol(&self) -> bool {
        self.symbol.trim().is_empty()
    }

    pub fn is_security_transaction(&self, security_actions: &[String]) -> bool {
        let action = self.action.trim();
        security_actions.iter().any(|a| a == action)
    }

    /// Fields in the given column order, for writing.
    pub fn fields(&self, layout: &[Column]) -> Vec<&str> {
        layout.iter().map(|c| self.get(*c)).collect()
    }
}

/// How a missing symbol was filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolSource {
    Mapped,
    Reused,
    Generated,
    Fallback,
}

impl SymbolSource {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Mapped => "MAPPED",
            Self::Reused => "REUSED",
            Self::Generated => "GENERATED",
            Self::Fallback => "FALLBACK",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolAssignment {
    /// File line number (the header is line 1).
    pub row: usize,
    pub description: String,
    pub symbol: String,
    pub source: SymbolSource,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoundingFix {
    pub row: usize,
    pub symbol: String,
    pub description: String,
    pub old_amount: String,
    pub new_amount: String,
    pub difference: f64,
}
