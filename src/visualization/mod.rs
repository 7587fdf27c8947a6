mod tables;

pub use tables::{
    format_polygon_report, print_polygon_report,
    format_ranking_summary, print_ranking_summary,
    format_utilization_table, print_utilization_table,
};
