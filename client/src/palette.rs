/// Fixed display palette for users. Assignment cycles with wraparound
/// once every color is taken; collisions are accepted.
pub const USER_PALETTE: [&str; 8] = [
    "#e46b49", "#2f7fd1", "#3a9e5f", "#b04fc4", "#d1a12f", "#1f9e9e", "#d14f7f", "#6b6bd1",
];

pub fn color_for(seat: usize) -> &'static str {
    USER_PALETTE[seat % USER_PALETTE.len()]
}
