pub mod loader;
pub mod provider;
pub mod series;
pub mod types;

pub use loader::{
    parse_timestamp, CsvBarProvider, JsonEarningsCalendar, LoaderError, EXPECTED_COLUMNS,
};
pub use provider::{
    BarSeriesProvider, EarningsCalendarProvider, InMemoryBarProvider, InMemoryEarningsCalendar,
    SyntheticEarningsCalendar,
};
pub use series::{SeriesError, SymbolSeries};
pub use types::{Bar, Granularity, OptionType};
