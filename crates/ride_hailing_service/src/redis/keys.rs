/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

// All keys share the `{geo}` hash tag so that scripts may touch them together on a cluster.

pub fn driver_positions_key() -> String {
    "rhs:tracker:{geo}:positions".to_string()
}

pub fn driver_last_seen_key() -> String {
    "rhs:tracker:{geo}:last_seen".to_string()
}

pub fn driver_reported_at_key() -> String {
    "rhs:tracker:{geo}:reported_at".to_string()
}
